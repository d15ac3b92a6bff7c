/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenialReason {
    /// Protected path requested without an `Authorization` header
    #[error("Authorization header missing")]
    MissingAuthHeader,

    /// Header present but not of the form `Bearer <token>`
    ///
    /// Carries a description of the shape, never the header value itself.
    #[error("Expected bearer token: {0}")]
    MalformedAuthHeader(String),

    /// Signature, lifetime or audience check failed, or no key was found
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token body is not a claim mapping
    #[error("Could not parse token claims: {0}")]
    MalformedClaims(String),

    /// Valid token whose roles do not grant any permission the path requires
    #[error("Unauthorized request")]
    Unauthorized,
}

impl DenialReason {
    /// Whether the caller failed to authenticate, as opposed to lacking rights
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, DenialReason::Unauthorized)
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for DenialReason {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{header, StatusCode};

        if self.is_authentication_failure() {
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                self.to_string(),
            )
                .into_response()
        } else {
            (StatusCode::FORBIDDEN, self.to_string()).into_response()
        }
    }
}
