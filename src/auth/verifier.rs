//! End-to-end request verification
//!
//! [`TokenVerifier::verify`] runs the checks in a fixed order and stops at
//! the first one that fails:
//!
//! 1. paths without a requirement are allowed straight away
//! 2. the `Authorization` header must hold `Bearer <token>`
//! 3. the token signature, lifetime and audience must check out
//! 4. the token body must be a claim mapping
//! 5. roles are read from the configured claim path
//! 6. the roles must grant one of the permissions the path requires

use std::sync::Arc;

use http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, decode_header, Validation};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing;

use super::claims::{extract_roles, Claims};
use super::engine::AuthorizationEngine;
use super::error::DenialReason;
use super::policy::PermissionPolicy;
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::oidc::discovery::discover;
use crate::oidc::keys::{JwksKeyResolver, KeyResolver, StaticKeyResolver};

/// Result of verifying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Allowed,
    Denied(DenialReason),
}

impl VerificationOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, VerificationOutcome::Allowed)
    }

    pub fn reason(&self) -> Option<&DenialReason> {
        match self {
            VerificationOutcome::Allowed => None,
            VerificationOutcome::Denied(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), DenialReason> {
        match self {
            VerificationOutcome::Allowed => Ok(()),
            VerificationOutcome::Denied(reason) => Err(reason),
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header
///
/// The value must consist of exactly two whitespace separated fields, the
/// first being `Bearer`. An empty value counts as missing. Rejections
/// describe the shape of the value without repeating it.
pub fn extract_bearer_token(headers: &HeaderMap) -> std::result::Result<&str, DenialReason> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(DenialReason::MissingAuthHeader)?;
    let value = value.to_str().map_err(|_| {
        DenialReason::MalformedAuthHeader("header value is not visible ASCII".to_string())
    })?;
    if value.is_empty() {
        return Err(DenialReason::MissingAuthHeader);
    }

    let fields: Vec<&str> = value.split_whitespace().collect();
    match fields.as_slice() {
        ["Bearer", token] => Ok(*token),
        [scheme, ..] if *scheme != "Bearer" => Err(DenialReason::MalformedAuthHeader(
            "scheme is not Bearer".to_string(),
        )),
        _ => Err(DenialReason::MalformedAuthHeader(format!(
            "expected 2 fields, got {}",
            fields.len()
        ))),
    }
}

/// Sort a decode failure into a bad token or a bad claim body
fn classify_decode_error(err: &JwtError) -> DenialReason {
    match err.kind() {
        ErrorKind::Json(_) => DenialReason::MalformedClaims(err.to_string()),
        _ => DenialReason::InvalidToken(err.to_string()),
    }
}

/// Verifies bearer tokens and enforces a [`PermissionPolicy`] per path
///
/// Holds only immutable state plus a shared [`KeyResolver`]; wrap it in an
/// `Arc` and share it between request handlers. A background key refresh
/// started by [`from_config`](Self::from_config) stops when the verifier is
/// dropped.
pub struct TokenVerifier {
    engine: AuthorizationEngine,
    resolver: Arc<dyn KeyResolver>,
    audience: String,
    role_claim_path: String,
    issuer: Option<String>,
    leeway_secs: u64,
    refresh_task: Option<JoinHandle<()>>,
}

impl Drop for TokenVerifier {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("audience", &self.audience)
            .field("role_claim_path", &self.role_claim_path)
            .field("issuer", &self.issuer)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(
        policy: PermissionPolicy,
        audience: impl Into<String>,
        role_claim_path: impl Into<String>,
        resolver: Arc<dyn KeyResolver>,
    ) -> Self {
        Self {
            engine: AuthorizationEngine::new(Arc::new(policy)),
            resolver,
            audience: audience.into(),
            role_claim_path: role_claim_path.into(),
            issuer: None,
            leeway_secs: 0,
            refresh_task: None,
        }
    }

    /// Additionally require the token's `iss` to equal `issuer`
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Tolerate this much clock skew on `exp` and `nbf`
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Build a verifier from configuration
    ///
    /// With `use_remote_jwks` this performs OIDC discovery and the initial
    /// JWKS fetch, then keeps the keys refreshed in the background. Any
    /// failure here is fatal for startup.
    pub async fn from_config(config: &AuthzConfig) -> Result<Self> {
        let auth = config.auth_config()?;
        auth.validate()?;

        let (resolver, refresh_task): (Arc<dyn KeyResolver>, _) = if auth.use_remote_jwks {
            let options = auth.jwks.to_refresh_options();
            let http_client = Client::builder().timeout(options.refresh_timeout).build()?;
            let document = discover(&http_client, &auth.issuer_url).await?;
            let remote = Arc::new(JwksKeyResolver::connect(document.jwks_uri, options).await?);
            tracing::info!(jwks_uri = remote.jwks_uri(), "Watching remote JWKS");
            let task = remote.clone().spawn_refresh();
            let resolver: Arc<dyn KeyResolver> = remote;
            (resolver, Some(task))
        } else {
            let jwks_json = auth.jwks_json.as_deref().ok_or_else(|| {
                AuthzError::Config("jwks_json is required when use_remote_jwks is disabled".to_string())
            })?;
            let resolver: Arc<dyn KeyResolver> = Arc::new(StaticKeyResolver::from_json(jwks_json)?);
            (resolver, None)
        };

        let mut verifier = Self::new(
            config.policy(),
            auth.audience.clone(),
            auth.role_claim_path.clone(),
            resolver,
        )
        .with_leeway(auth.leeway_secs);
        verifier.refresh_task = refresh_task;
        if auth.validate_issuer {
            verifier = verifier.with_issuer(auth.issuer_url.clone());
        }
        Ok(verifier)
    }

    pub fn policy(&self) -> &PermissionPolicy {
        self.engine.policy()
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn role_claim_path(&self) -> &str {
        &self.role_claim_path
    }

    fn validation(&self, algorithm: jsonwebtoken::Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway_secs;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Check signature, lifetime and audience of `token` and decode its claims
    pub async fn validate_token(&self, token: &str) -> std::result::Result<Claims, DenialReason> {
        let header = decode_header(token)
            .map_err(|e| DenialReason::InvalidToken(format!("Invalid JWT header: {}", e)))?;

        let kid = header
            .kid
            .ok_or_else(|| DenialReason::InvalidToken("JWT missing kid in header".to_string()))?;

        let resolved = self
            .resolver
            .resolve_key(&kid)
            .await
            .map_err(|e| DenialReason::InvalidToken(e.to_string()))?;

        tracing::debug!("Validating JWT with kid: {}, algorithm: {:?}", kid, resolved.algorithm);

        decode::<Claims>(token, &resolved.key, &self.validation(resolved.algorithm))
            .map(|data| data.claims)
            .map_err(|e| classify_decode_error(&e))
    }

    /// Decide whether a request for `path` carrying `headers` may proceed
    ///
    /// On success returns the verified claims, or `None` when the path does
    /// not require a token.
    pub async fn authorize(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<Option<Claims>, DenialReason> {
        if !self.engine.policy().requires_auth(path) {
            return Ok(None);
        }

        let token = extract_bearer_token(headers)?;
        let claims = self.validate_token(token).await?;

        let roles = extract_roles(&claims, &self.role_claim_path);
        let permissions = self.engine.permissions_for_roles(&roles);
        if self.engine.is_authorized(path, &permissions) {
            Ok(Some(claims))
        } else {
            tracing::debug!(path, ?roles, "Roles grant none of the required permissions");
            Err(DenialReason::Unauthorized)
        }
    }

    /// Same decision as [`authorize`](Self::authorize), without the claims
    pub async fn verify(&self, path: &str, headers: &HeaderMap) -> VerificationOutcome {
        match self.authorize(path, headers).await {
            Ok(_) => VerificationOutcome::Allowed,
            Err(reason) => {
                tracing::debug!(path, %reason, "Request denied");
                VerificationOutcome::Denied(reason)
            }
        }
    }
}
