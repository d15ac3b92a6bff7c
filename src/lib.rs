//! # bearer-authz
//!
//! Request-level authorization for HTTP APIs: a bearer token issued by an
//! OIDC provider is validated against the provider's signing keys, roles are
//! read from a configurable claim path, and a static policy decides whether
//! those roles grant any permission the requested path needs.
//!
//! Paths that are not listed in the policy need no token.
//!
//! ## Features
//!
//! - `axum` (default): [`RequirePolicy`](auth::RequirePolicy) tower layer,
//!   [`VerifiedClaims`](axum_integration::VerifiedClaims) extractor and
//!   `IntoResponse` for denials

pub mod error;
pub use error::{AuthzError, Result};

pub mod auth;
pub mod config;
pub mod oidc;

#[cfg(feature = "axum")]
pub mod axum_integration;

#[cfg(test)]
mod test_support;

pub use crate::auth::{
    Claims, DenialReason, PermissionPolicy, PermissionSet, TokenVerifier, VerificationOutcome,
};
pub use crate::config::{load_config, AuthzConfig};
pub use crate::oidc::{JwksKeyResolver, KeyResolver, ResolvedKey, StaticKeyResolver};

#[cfg(test)]
mod tests {
    use crate::error::AuthzError;

    #[test]
    fn test_error_creation() {
        let error = AuthzError::Config("test error".to_string());
        assert!(error.is_startup_error());
    }

    #[test]
    fn test_verifier_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<crate::TokenVerifier>();
        assert_send_sync::<crate::JwksKeyResolver>();
        assert_send_sync::<crate::PermissionPolicy>();
    }
}
