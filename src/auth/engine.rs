use std::sync::Arc;

use super::policy::{PermissionPolicy, PermissionSet};

/// Turns roles into permissions and permissions into a decision for a path
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    policy: Arc<PermissionPolicy>,
}

impl AuthorizationEngine {
    pub fn new(policy: Arc<PermissionPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub fn permissions_for_roles<S: AsRef<str>>(&self, roles: &[S]) -> PermissionSet {
        self.policy.permissions_for_roles(roles)
    }

    /// True when `path` is open, or when `permissions` holds any of the
    /// permissions it requires.
    pub fn is_authorized(&self, path: &str, permissions: &PermissionSet) -> bool {
        let required = self.policy.required_permissions(path);
        required.is_empty() || required.iter().any(|p| permissions.contains(p))
    }

    /// Shorthand for `is_authorized(path, permissions_for_roles(roles))`
    pub fn roles_authorized<S: AsRef<str>>(&self, path: &str, roles: &[S]) -> bool {
        self.is_authorized(path, &self.permissions_for_roles(roles))
    }
}
