//! Axum integration
//!
//! - [`VerifiedClaims`]: extractor for the claims of a token accepted by
//!   [`RequirePolicy`](crate::auth::RequirePolicy)
//! - [`extract_bearer_token`]: bearer header parsing, re-exported for handlers
//!   that want to inspect the raw token
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{routing::post, Router};
//! use bearer_authz::{auth::RequirePolicy, axum_integration::VerifiedClaims};
//!
//! async fn delete_entry(claims: VerifiedClaims) -> String {
//!     format!("deleted by {}", claims.subject().unwrap_or("unknown"))
//! }
//!
//! let app = Router::new()
//!     .route("/api/entry/delete", post(delete_entry))
//!     .layer(RequirePolicy::new(verifier));
//! ```

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::ops::Deref;

use crate::auth::claims::Claims;

pub use crate::auth::verifier::extract_bearer_token;

/// Claims of the token that authorized the current request
///
/// Only present on paths that required a token. Handlers on open paths
/// should take `Option<VerifiedClaims>`.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub Claims);

impl Deref for VerifiedClaims {
    type Target = Claims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Claims> for VerifiedClaims {
    fn from(claims: Claims) -> Self {
        Self(claims)
    }
}

impl VerifiedClaims {
    pub fn into_inner(self) -> Claims {
        self.0
    }
}

impl<S> FromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S> axum::extract::OptionalFromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<VerifiedClaims>().cloned())
    }
}
