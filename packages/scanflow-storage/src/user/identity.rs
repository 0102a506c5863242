//! Identity of a user authenticated by an external provider

use serde::Serialize;

use crate::{Result, StorageError};

/// Validated once, at construction; immutable afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    provider_id: String,
    login: String,
    name: String,
    email: Option<String>,
}

impl UserIdentity {
    pub fn new(
        provider_id: impl Into<String>,
        login: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
    ) -> Result<Self> {
        let identity = Self {
            provider_id: provider_id.into(),
            login: login.into(),
            name: name.into(),
            email,
        };
        identity.validate()?;
        Ok(identity)
    }

    fn validate(&self) -> Result<()> {
        check(!is_blank(&self.provider_id), "User id must not be blank")?;
        check(
            (3..=255).contains(&char_len(&self.provider_id)),
            "User id size is incorrect (Between 3 and 255 characters)",
        )?;
        check(!is_blank(&self.login), "User login must not be blank")?;
        check(
            (3..=255).contains(&char_len(&self.login)),
            "User login size is incorrect (Between 3 and 255 characters)",
        )?;
        check(!is_blank(&self.name), "User name must not be blank")?;
        check(
            char_len(&self.name) <= 200,
            "User name size is too big (200 characters max)",
        )?;
        check(
            self.email.as_deref().map_or(true, |e| char_len(e) <= 100),
            "User email size is too big (100 characters max)",
        )
    }

    /// Unique for the provider only
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Unique across all providers
    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

fn check(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(StorageError::validation(message))
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<UserIdentity>) -> String {
        result.unwrap_err().message
    }

    #[test]
    fn test_create_user() {
        let identity =
            UserIdentity::new("ABCD", "john", "John", Some("john@email.com".to_string())).unwrap();
        assert_eq!(identity.provider_id(), "ABCD");
        assert_eq!(identity.login(), "john");
        assert_eq!(identity.name(), "John");
        assert_eq!(identity.email(), Some("john@email.com"));
    }

    #[test]
    fn test_email_is_optional() {
        assert!(UserIdentity::new("ABCD", "john", "John", None).is_ok());
    }

    #[test]
    fn test_provider_id_bounds() {
        assert_eq!(message(UserIdentity::new(" ", "john", "John", None)), "User id must not be blank");
        assert_eq!(
            message(UserIdentity::new("ab", "john", "John", None)),
            "User id size is incorrect (Between 3 and 255 characters)"
        );
        assert!(UserIdentity::new("a".repeat(255), "john", "John", None).is_ok());
        assert!(UserIdentity::new("a".repeat(256), "john", "John", None).is_err());
    }

    #[test]
    fn test_login_bounds() {
        assert_eq!(message(UserIdentity::new("ABCD", "", "John", None)), "User login must not be blank");
        assert_eq!(
            message(UserIdentity::new("ABCD", "jo", "John", None)),
            "User login size is incorrect (Between 3 and 255 characters)"
        );
    }

    #[test]
    fn test_name_bounds() {
        assert_eq!(message(UserIdentity::new("ABCD", "john", "  ", None)), "User name must not be blank");
        assert!(UserIdentity::new("ABCD", "john", "n".repeat(200), None).is_ok());
        assert_eq!(
            message(UserIdentity::new("ABCD", "john", "n".repeat(201), None)),
            "User name size is too big (200 characters max)"
        );
    }

    #[test]
    fn test_email_bounds() {
        assert!(UserIdentity::new("ABCD", "john", "John", Some("e".repeat(100))).is_ok());
        assert!(UserIdentity::new("ABCD", "john", "John", Some("e".repeat(101)))
            .unwrap_err()
            .is_validation());
    }
}
