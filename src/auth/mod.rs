//! Request authorization: claims, policy, decision and enforcement
//!
//! # Features
//!
//! - [`Claims`] and [`extract_roles`] for reading roles out of a nested claim body
//! - [`PermissionPolicy`] mapping paths to required permissions and roles to
//!   granted permissions
//! - [`AuthorizationEngine`] for the allow/deny decision on a path
//! - [`TokenVerifier`] running the whole check for a request
//! - [`RequirePolicy`] middleware layer enforcing it in front of axum services
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::Router;
//! use bearer_authz::auth::{PermissionPolicy, RequirePolicy, TokenVerifier};
//! use bearer_authz::oidc::StaticKeyResolver;
//!
//! let resolver = StaticKeyResolver::from_json(&jwks_json)?;
//! let verifier = TokenVerifier::new(
//!     PermissionPolicy::builtin(),
//!     "tornjak-backend",
//!     "realm_access.roles",
//!     Arc::new(resolver),
//! );
//!
//! let app = Router::new()
//!     .route("/api/entry/delete", post(delete_entry))
//!     .layer(RequirePolicy::new(Arc::new(verifier)));
//! ```

pub mod claims;
pub mod engine;
pub mod error;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod policy;
pub mod verifier;

pub use claims::{extract_roles, ClaimValue, Claims, Scalar};
pub use engine::AuthorizationEngine;
pub use error::DenialReason;
#[cfg(feature = "axum")]
pub use middleware::{RequirePolicy, RequirePolicyMiddleware};
pub use policy::{PermissionPolicy, PermissionPolicyBuilder, PermissionSet, PolicyConfig};
pub use verifier::{extract_bearer_token, TokenVerifier, VerificationOutcome};
