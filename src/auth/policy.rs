//! Static permission policy: which paths need which permissions, and which
//! roles grant them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Set of permission names held by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: impl Into<String>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Immutable authorization tables
///
/// `path_requirements` maps an exact request path to the permissions that
/// may access it; holding any one of them is enough. `role_permissions` maps
/// a role name to the permissions it grants.
///
/// A path missing from the table, or mapped to an empty list, requires no
/// authorization at all. New endpoints are therefore open until they are
/// listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPolicy {
    path_requirements: HashMap<String, Vec<String>>,
    role_permissions: HashMap<String, BTreeSet<String>>,
}

fn dedup_in_order<I, S>(permissions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = BTreeSet::new();
    permissions
        .into_iter()
        .map(Into::into)
        .filter(|p: &String| seen.insert(p.clone()))
        .collect()
}

impl PermissionPolicy {
    /// Build a policy from raw tables
    pub fn new(
        path_requirements: HashMap<String, Vec<String>>,
        role_permissions: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            path_requirements: path_requirements
                .into_iter()
                .map(|(path, perms)| (path, dedup_in_order(perms)))
                .collect(),
            role_permissions: role_permissions
                .into_iter()
                .map(|(role, perms)| (role, perms.into_iter().collect()))
                .collect(),
        }
    }

    pub fn builder() -> PermissionPolicyBuilder {
        PermissionPolicyBuilder::default()
    }

    /// The Tornjak API table with its Keycloak realm roles
    pub fn builtin() -> Self {
        const VIEWER_PATHS: &[&str] = &[
            "/api/healthcheck",
            "/api/debugserver",
            "/api/agent/list",
            "/api/entry/list",
            "/api/tornjak/serverinfo",
            "/api/tornjak/selectors/list",
            "/api/tornjak/agents/list",
            "/api/tornjak/clusters/list",
        ];
        const ADMIN_PATHS: &[&str] = &[
            "/api/agent/ban",
            "/api/agent/delete",
            "/api/agent/createjointoken",
            "/api/entry/create",
            "/api/entry/delete",
            "/api/tornjak/selectors/register",
            "/api/tornjak/clusters/create",
            "/api/tornjak/clusters/edit",
            "/api/tornjak/clusters/delete",
        ];

        let mut builder = Self::builder().require("/", Vec::<String>::new());
        for path in VIEWER_PATHS {
            builder = builder.require(*path, ["admin", "viewer"]);
        }
        for path in ADMIN_PATHS {
            builder = builder.require(*path, ["admin"]);
        }
        builder
            .grant("tornjak-viewer-realm-role", ["viewer"])
            .grant("tornjak-admin-realm-role", ["admin"])
            .build()
    }

    /// Permissions that may access `path`; empty means unprotected
    pub fn required_permissions(&self, path: &str) -> &[String] {
        self.path_requirements
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `path` needs a token at all
    pub fn requires_auth(&self, path: &str) -> bool {
        !self.required_permissions(path).is_empty()
    }

    /// Union of the permissions granted by `roles`; unknown roles add nothing
    pub fn permissions_for_roles<S: AsRef<str>>(&self, roles: &[S]) -> PermissionSet {
        roles
            .iter()
            .filter_map(|role| self.role_permissions.get(role.as_ref()))
            .flatten()
            .cloned()
            .collect()
    }

    /// Paths that have a requirement entry, protected or not
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.path_requirements.keys().map(String::as_str)
    }
}

/// Incremental construction of a [`PermissionPolicy`]
#[derive(Debug, Default)]
pub struct PermissionPolicyBuilder {
    path_requirements: HashMap<String, Vec<String>>,
    role_permissions: HashMap<String, Vec<String>>,
}

impl PermissionPolicyBuilder {
    /// Require any one of `permissions` for `path`, replacing an earlier entry
    pub fn require<I, S>(mut self, path: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_requirements
            .insert(path.into(), permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Let `role` grant `permissions`, adding to earlier grants
    pub fn grant<I, S>(mut self, role: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_permissions
            .entry(role.into())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> PermissionPolicy {
        PermissionPolicy::new(self.path_requirements, self.role_permissions)
    }
}

/// `[policy]` section of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path to required permissions (any one suffices)
    #[serde(default)]
    pub paths: HashMap<String, Vec<String>>,

    /// Role to granted permissions
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

impl From<PolicyConfig> for PermissionPolicy {
    fn from(config: PolicyConfig) -> Self {
        PermissionPolicy::new(config.paths, config.roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_path_requires_nothing() {
        let policy = PermissionPolicy::builtin();
        assert!(policy.required_permissions("/api/not/registered").is_empty());
        assert!(!policy.requires_auth("/api/not/registered"));
        assert!(!policy.requires_auth("/"));
    }

    #[test]
    fn test_builtin_requirements() {
        let policy = PermissionPolicy::builtin();
        assert_eq!(policy.required_permissions("/api/entry/list"), ["admin", "viewer"]);
        assert_eq!(policy.required_permissions("/api/entry/delete"), ["admin"]);
        assert_eq!(policy.paths().count(), 18);
    }

    #[test]
    fn test_permissions_for_roles_union() {
        let policy = PermissionPolicy::builder()
            .grant("a", ["read"])
            .grant("b", ["read", "write"])
            .build();
        let perms = policy.permissions_for_roles(&["a", "b"]);
        assert_eq!(perms.iter().collect::<Vec<_>>(), vec!["read", "write"]);
    }

    #[test]
    fn test_unknown_roles_grant_nothing() {
        let policy = PermissionPolicy::builtin();
        let perms = policy.permissions_for_roles(&["stranger", "tornjak-viewer-realm-role"]);
        assert_eq!(perms, PermissionSet::from_iter(["viewer"]));

        let none: [&str; 0] = [];
        assert!(policy.permissions_for_roles(&none).is_empty());
    }

    #[test]
    fn test_requirements_deduplicated_in_order() {
        let policy = PermissionPolicy::builder()
            .require("/x", ["viewer", "admin", "viewer"])
            .build();
        assert_eq!(policy.required_permissions("/x"), ["viewer", "admin"]);
    }

    #[test]
    fn test_grant_accumulates() {
        let policy = PermissionPolicy::builder()
            .grant("ops", ["deploy"])
            .grant("ops", ["rollback"])
            .build();
        let perms = policy.permissions_for_roles(&["ops".to_string()]);
        assert!(perms.contains("deploy"));
        assert!(perms.contains("rollback"));
    }

    #[test]
    fn test_from_policy_config() {
        let config = PolicyConfig {
            paths: HashMap::from([("/api/entry/delete".to_string(), vec!["admin".to_string()])]),
            roles: HashMap::from([("root".to_string(), vec!["admin".to_string()])]),
        };
        let policy = PermissionPolicy::from(config);
        assert!(policy.requires_auth("/api/entry/delete"));
        assert!(!policy.requires_auth("/api/entry/list"));
        assert!(policy.permissions_for_roles(&["root"]).contains("admin"));
    }
}
