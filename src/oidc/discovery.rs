//! OIDC issuer discovery

use reqwest::Client;
use tracing;

use super::types::OidcDiscoveryDocument;
use crate::error::{AuthzError, Result};

/// Build the well-known discovery URL for an issuer
pub fn discovery_url(issuer_url: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    )
}

/// Fetch the OIDC discovery document for `issuer_url`
///
/// Called once at startup to locate the issuer's signing keys.
pub async fn discover(http_client: &Client, issuer_url: &str) -> Result<OidcDiscoveryDocument> {
    if issuer_url.is_empty() {
        return Err(AuthzError::Config("issuer_url must not be empty".to_string()));
    }

    let url = discovery_url(issuer_url);
    tracing::debug!("Fetching OIDC discovery document from: {}", url);

    let response = http_client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| AuthzError::OidcDiscovery(format!("Failed to fetch discovery document: {}", e)))?;

    if !response.status().is_success() {
        return Err(AuthzError::OidcDiscovery(format!(
            "Discovery document fetch failed with status: {}",
            response.status()
        )));
    }

    let document: OidcDiscoveryDocument = response
        .json()
        .await
        .map_err(|e| AuthzError::OidcDiscovery(format!("Failed to parse discovery document: {}", e)))?;

    tracing::debug!(issuer = %document.issuer, jwks_uri = %document.jwks_uri, "OIDC discovery complete");
    Ok(document)
}
