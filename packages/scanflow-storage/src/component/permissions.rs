//! Caller permissions, as seen by the component services

use std::collections::{HashMap, HashSet};

pub const SYSTEM_ADMIN: &str = "admin";

/// Project-level roles
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";
}

/// Permissions of the current caller
///
/// Authentication and permission storage live outside this crate; services
/// only ask questions through this trait.
pub trait UserSession: Send + Sync {
    fn user_id(&self) -> Option<i64>;

    fn has_permission(&self, global_permission: &str) -> bool;

    fn has_component_uuid_permission(&self, role: &str, project_uuid: &str) -> bool;
}

/// Fixed set of permissions
#[derive(Debug, Clone, Default)]
pub struct StaticUserSession {
    user_id: Option<i64>,
    global: HashSet<String>,
    by_project: HashMap<String, HashSet<String>>,
}

impl StaticUserSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn logged_in(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_global_permission(mut self, permission: impl Into<String>) -> Self {
        self.global.insert(permission.into());
        self
    }

    pub fn with_project_permission(
        mut self,
        role: impl Into<String>,
        project_uuid: impl Into<String>,
    ) -> Self {
        self.by_project
            .entry(project_uuid.into())
            .or_default()
            .insert(role.into());
        self
    }
}

impl UserSession for StaticUserSession {
    fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    fn has_permission(&self, global_permission: &str) -> bool {
        self.global.contains(global_permission)
    }

    fn has_component_uuid_permission(&self, role: &str, project_uuid: &str) -> bool {
        self.by_project
            .get(project_uuid)
            .map_or(false, |r| r.contains(role))
    }
}
