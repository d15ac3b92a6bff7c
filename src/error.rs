//! Error types for startup and key resolution

/// Crate-level error type
///
/// Request-time denials are reported through
/// [`DenialReason`](crate::auth::DenialReason); this type covers everything
/// that happens while building a verifier or resolving keys.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OIDC discovery error: {0}")]
    OidcDiscovery(String),

    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),

    #[error("Key resolution error: {0}")]
    KeyResolution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AuthzError>;

impl AuthzError {
    /// Whether this error can only occur while constructing a verifier
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            AuthzError::Config(_) | AuthzError::OidcDiscovery(_) | AuthzError::Io(_)
        )
    }
}
