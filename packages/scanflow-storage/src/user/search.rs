//! User search enrichment
//!
//! The page of users itself comes from the search index; this adds, in one
//! session, the groups and the token count of every user on the page.

use serde::Serialize;
use std::sync::Arc;

use crate::component::permissions::{UserSession, SYSTEM_ADMIN};
use crate::domain::Repository;
use crate::Result;

/// A user as returned by the search index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSearchRow {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    /// Only disclosed to system administrators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    pub tokens_count: u32,
}

pub struct UserSearchEnricher {
    repository: Arc<dyn Repository>,
}

impl UserSearchEnricher {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Rows in the order of `users`
    pub fn enrich(&self, caller: &dyn UserSession, users: Vec<UserSummary>) -> Result<Vec<UserSearchRow>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let logins: Vec<String> = users.iter().map(|u| u.login.clone()).collect();

        let (mut groups_by_login, tokens_by_login) = {
            let mut session = self.repository.open_session()?;
            (
                session.select_groups_by_logins(&logins)?,
                session.count_tokens_by_logins(&logins)?,
            )
        };

        let show_groups = caller.has_permission(SYSTEM_ADMIN);
        Ok(users
            .into_iter()
            .map(|user| {
                let groups = show_groups
                    .then(|| groups_by_login.remove(&user.login).unwrap_or_default());
                let tokens_count = tokens_by_login.get(&user.login).copied().unwrap_or(0);
                UserSearchRow {
                    login: user.login,
                    name: user.name,
                    email: user.email,
                    active: user.active,
                    groups,
                    tokens_count,
                }
            })
            .collect())
    }
}
