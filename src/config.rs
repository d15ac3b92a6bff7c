//! Configuration loading
//!
//! Settings come from a TOML file with an `[auth]` section describing where
//! tokens come from and an optional `[policy]` section replacing the built-in
//! permission table.
//!
//! # Example
//!
//! ```rust,ignore
//! use bearer_authz::{config::load_config, TokenVerifier};
//!
//! let config = load_config("authz.toml")?;
//! let verifier = TokenVerifier::from_config(&config).await?;
//! ```

use crate::auth::policy::{PermissionPolicy, PolicyConfig};
use crate::oidc::types::JwksRefreshOptions;
use crate::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Token source and validation settings
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Permission tables; the built-in table is used when absent
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
}

impl AuthzConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }

    /// Get the `[auth]` section
    pub fn auth_config(&self) -> Result<&AuthConfig> {
        self.auth.as_ref().ok_or_else(|| {
            AuthzError::Config("auth configuration not found in config file".to_string())
        })
    }

    /// The configured permission policy, or the built-in one
    pub fn policy(&self) -> PermissionPolicy {
        match &self.policy {
            Some(policy) => PermissionPolicy::from(policy.clone()),
            None => PermissionPolicy::builtin(),
        }
    }
}

/// `[auth]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Fetch keys from the issuer's JWKS endpoint instead of `jwks_json`
    #[serde(default = "default_true")]
    pub use_remote_jwks: bool,

    /// OIDC issuer URL, used for discovery
    #[serde(default)]
    pub issuer_url: String,

    /// Value the token's `aud` claim must contain
    pub audience: String,

    /// Dotted path to the role list inside the token claims
    #[serde(default = "default_role_claim_path")]
    pub role_claim_path: String,

    /// Inline JWK set, required when `use_remote_jwks` is false
    #[serde(default)]
    pub jwks_json: Option<String>,

    /// Also require `iss` to equal `issuer_url`
    #[serde(default)]
    pub validate_issuer: bool,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,

    /// Remote JWKS refresh settings
    #[serde(default)]
    pub jwks: JwksConfig,
}

fn default_true() -> bool {
    true
}

fn default_role_claim_path() -> String {
    "realm_access.roles".to_string()
}

impl AuthConfig {
    /// Check the settings that cannot be validated by deserialization alone
    pub fn validate(&self) -> Result<()> {
        if self.audience.is_empty() {
            return Err(AuthzError::Config("audience must not be empty".to_string()));
        }
        if self.use_remote_jwks && self.issuer_url.is_empty() {
            return Err(AuthzError::Config(
                "issuer_url is required when use_remote_jwks is enabled".to_string(),
            ));
        }
        if !self.use_remote_jwks && self.jwks_json.is_none() {
            return Err(AuthzError::Config(
                "jwks_json is required when use_remote_jwks is disabled".to_string(),
            ));
        }
        if self.validate_issuer && self.issuer_url.is_empty() {
            return Err(AuthzError::Config(
                "issuer_url is required when validate_issuer is enabled".to_string(),
            ));
        }
        if self.role_claim_path.is_empty() {
            tracing::warn!("role_claim_path is empty, every protected path will be denied");
        }
        Ok(())
    }
}

/// `[auth.jwks]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_refresh_rate_limit_secs")]
    pub refresh_rate_limit_secs: u64,

    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub refresh_unknown_kid: bool,
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

fn default_refresh_rate_limit_secs() -> u64 {
    300
}

fn default_refresh_timeout_secs() -> u64 {
    10
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            refresh_rate_limit_secs: default_refresh_rate_limit_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            refresh_unknown_kid: true,
        }
    }
}

impl JwksConfig {
    /// Convert to the options taken by [`JwksKeyResolver`](crate::oidc::JwksKeyResolver)
    pub fn to_refresh_options(&self) -> JwksRefreshOptions {
        JwksRefreshOptions {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            refresh_rate_limit: Duration::from_secs(self.refresh_rate_limit_secs),
            refresh_timeout: Duration::from_secs(self.refresh_timeout_secs),
            refresh_unknown_kid: self.refresh_unknown_kid,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AuthzConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| AuthzError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| AuthzError::Config(format!("Failed to parse TOML config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_auth_config() {
        let toml_str = r#"
[auth]
issuer_url = "https://keycloak.example.com/realms/tornjak"
audience = "tornjak-backend"
"#;
        let config: AuthzConfig = toml::from_str(toml_str).unwrap();
        let auth = config.auth_config().unwrap();
        assert!(auth.use_remote_jwks);
        assert_eq!(auth.role_claim_path, "realm_access.roles");
        assert_eq!(auth.leeway_secs, 0);
        assert!(!auth.validate_issuer);
        assert_eq!(auth.jwks, JwksConfig::default());
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[auth]
use_remote_jwks = false
issuer_url = "https://idm.example.com"
audience = "api"
role_claim_path = "resource_access.tornjak.roles"
jwks_json = '{"keys": []}'
validate_issuer = true
leeway_secs = 30

[auth.jwks]
refresh_interval_secs = 600
refresh_unknown_kid = false

[policy.paths]
"/api/entry/delete" = ["admin"]
"/" = []

[policy.roles]
"ops" = ["admin", "viewer"]
"#;
        let config: AuthzConfig = toml::from_str(toml_str).unwrap();
        let auth = config.auth_config().unwrap();
        assert!(!auth.use_remote_jwks);
        assert_eq!(auth.jwks_json.as_deref(), Some(r#"{"keys": []}"#));
        assert_eq!(auth.leeway_secs, 30);

        let options = auth.jwks.to_refresh_options();
        assert_eq!(options.refresh_interval, Duration::from_secs(600));
        assert_eq!(options.refresh_rate_limit, Duration::from_secs(300));
        assert!(!options.refresh_unknown_kid);

        let policy = config.policy();
        assert!(policy.requires_auth("/api/entry/delete"));
        assert!(!policy.requires_auth("/api/entry/list"));
        assert!(policy.permissions_for_roles(&["ops"]).contains("viewer"));
    }

    #[test]
    fn test_missing_auth_section() {
        let config: AuthzConfig = toml::from_str("").unwrap();
        assert!(matches!(config.auth_config(), Err(AuthzError::Config(_))));
        assert!(config.policy().requires_auth("/api/entry/delete"));
    }

    #[test]
    fn test_missing_audience_is_parse_error() {
        let toml_str = r#"
[auth]
issuer_url = "https://idm.example.com"
"#;
        assert!(toml::from_str::<AuthzConfig>(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_inconsistent_settings() {
        let base = AuthConfig {
            use_remote_jwks: true,
            issuer_url: "https://idm.example.com".to_string(),
            audience: "api".to_string(),
            role_claim_path: default_role_claim_path(),
            jwks_json: None,
            validate_issuer: false,
            leeway_secs: 0,
            jwks: JwksConfig::default(),
        };
        assert!(base.validate().is_ok());

        let no_audience = AuthConfig { audience: String::new(), ..base.clone() };
        assert!(no_audience.validate().is_err());

        let no_issuer = AuthConfig { issuer_url: String::new(), ..base.clone() };
        assert!(no_issuer.validate().is_err());

        let no_inline_keys = AuthConfig { use_remote_jwks: false, ..base };
        assert!(no_inline_keys.validate().is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/authz.toml").unwrap_err();
        assert!(matches!(err, AuthzError::Config(_)));
    }
}
