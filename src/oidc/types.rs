//! Common types for OIDC discovery and key resolution

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OIDC discovery document
///
/// Only `jwks_uri` is used; the remaining fields are kept for logging and for
/// callers that want to inspect the issuer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    /// Issuer identifier
    pub issuer: String,
    /// JWKS URI
    pub jwks_uri: String,
    /// Authorization endpoint
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// Signing algorithms the issuer advertises
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Verification key resolved for a key identifier
#[derive(Clone)]
pub struct ResolvedKey {
    /// Key used to check the token signature
    pub key: DecodingKey,
    /// Algorithm the key is bound to
    pub algorithm: Algorithm,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Refresh behaviour of a remote JWKS resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwksRefreshOptions {
    /// How long fetched keys are considered fresh
    pub refresh_interval: Duration,
    /// Minimum time between two fetches triggered by an unknown `kid`
    pub refresh_rate_limit: Duration,
    /// Timeout applied to each JWKS request
    pub refresh_timeout: Duration,
    /// Refetch the key set when a token names a `kid` we have not seen
    pub refresh_unknown_kid: bool,
}

impl Default for JwksRefreshOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(3600),
            refresh_rate_limit: Duration::from_secs(300),
            refresh_timeout: Duration::from_secs(10),
            refresh_unknown_kid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_document_minimal() {
        let doc: OidcDiscoveryDocument = serde_json::from_str(
            r#"{"issuer": "https://idm.example.com", "jwks_uri": "https://idm.example.com/certs"}"#,
        )
        .unwrap();
        assert_eq!(doc.jwks_uri, "https://idm.example.com/certs");
        assert!(doc.token_endpoint.is_none());
        assert!(doc.id_token_signing_alg_values_supported.is_empty());
    }

    #[test]
    fn test_discovery_document_missing_jwks_uri() {
        let result: std::result::Result<OidcDiscoveryDocument, _> =
            serde_json::from_str(r#"{"issuer": "https://idm.example.com"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_refresh_options() {
        let options = JwksRefreshOptions::default();
        assert_eq!(options.refresh_interval, Duration::from_secs(3600));
        assert_eq!(options.refresh_rate_limit, Duration::from_secs(300));
        assert_eq!(options.refresh_timeout, Duration::from_secs(10));
        assert!(options.refresh_unknown_kid);
    }
}
