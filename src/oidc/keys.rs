//! Verification key resolution for JWT signatures
//!
//! [`KeyResolver`] is the seam between the token verifier and wherever keys
//! come from. Two implementations are provided:
//!
//! - [`JwksKeyResolver`] fetches a remote JWKS document, caches the keys and
//!   refreshes them periodically or when a token names an unknown `kid`.
//! - [`StaticKeyResolver`] serves a key set supplied inline as JSON, for
//!   offline deployments and tests.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing;

use super::types::{JwksRefreshOptions, ResolvedKey};
use crate::error::{AuthzError, Result};

/// Source of signature verification keys
///
/// Implementations must be safe to share between concurrent verifications and
/// may block briefly, e.g. while refreshing a key set.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve the key identified by `kid`
    async fn resolve_key(&self, kid: &str) -> Result<ResolvedKey>;
}

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const ES256_ALGORITHMS: &[Algorithm] = &[Algorithm::ES256];
const ES384_ALGORITHMS: &[Algorithm] = &[Algorithm::ES384];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const EDDSA_ALGORITHMS: &[Algorithm] = &[Algorithm::EdDSA];

fn explicit_algorithm(jwk: &Jwk) -> Result<Option<Algorithm>> {
    let Some(alg) = jwk.common.key_algorithm.as_ref() else {
        return Ok(None);
    };
    let mapped = match alg {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        // encryption algorithms are never valid for signature checks
        other => {
            return Err(AuthzError::KeyResolution(format!(
                "JWK algorithm {:?} is not a signing algorithm",
                other
            )))
        }
    };
    Ok(Some(mapped))
}

/// Whether a JWK may be used to check signatures
///
/// Keys marked for any `use` other than `sig` are not.
fn is_signing_key(jwk: &Jwk) -> bool {
    matches!(jwk.common.public_key_use, None | Some(PublicKeyUse::Signature))
}

/// Map a JWK to the signing algorithm its key must be used with
///
/// An explicit `alg` on the JWK wins as long as it fits the key type.
/// Symmetric keys are only accepted with an explicit HMAC `alg`, and an
/// explicit non-signing `alg` is an error.
pub fn jwk_algorithm_to_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    let explicit = explicit_algorithm(jwk)?;
    let (allowed, default) = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => (RSA_ALGORITHMS, Some(Algorithm::RS256)),
        AlgorithmParameters::EllipticCurve(params) => match &params.curve {
            EllipticCurve::P256 => (ES256_ALGORITHMS, Some(Algorithm::ES256)),
            EllipticCurve::P384 => (ES384_ALGORITHMS, Some(Algorithm::ES384)),
            other => {
                return Err(AuthzError::KeyResolution(format!(
                    "Unsupported elliptic curve for JWK: {:?}",
                    other
                )))
            }
        },
        AlgorithmParameters::OctetKey(_) => (HMAC_ALGORITHMS, None),
        AlgorithmParameters::OctetKeyPair(_) => (EDDSA_ALGORITHMS, Some(Algorithm::EdDSA)),
    };

    match (explicit, default) {
        (Some(alg), _) if allowed.contains(&alg) => Ok(alg),
        (Some(alg), _) => Err(AuthzError::KeyResolution(format!(
            "JWK algorithm {:?} does not match its key type",
            alg
        ))),
        (None, Some(alg)) => Ok(alg),
        (None, None) => Err(AuthzError::KeyResolution(
            "Symmetric JWK requires an explicit HMAC alg".to_string(),
        )),
    }
}

/// Turn a JWK set into usable keys indexed by `kid`
///
/// Keys without a `kid`, keys not meant for signatures and keys with
/// unsupported parameters are skipped.
pub fn parse_jwk_set(jwk_set: &JwkSet) -> HashMap<String, ResolvedKey> {
    let mut keys = HashMap::new();
    for jwk in &jwk_set.keys {
        let Some(kid) = &jwk.common.key_id else {
            tracing::warn!("JWK missing kid field, skipping");
            continue;
        };

        if !is_signing_key(jwk) {
            tracing::debug!("Skipping key {}: use is {:?}", kid, jwk.common.public_key_use);
            continue;
        }

        let algorithm = match jwk_algorithm_to_algorithm(jwk) {
            Ok(algorithm) => algorithm,
            Err(e) => {
                tracing::warn!("Unsupported algorithm for kid {}: {}", kid, e);
                continue;
            }
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                tracing::debug!("Parsed key {}: algorithm={:?}", kid, algorithm);
                keys.insert(kid.clone(), ResolvedKey { key, algorithm });
            }
            Err(err) => {
                tracing::warn!("Failed to create decoding key for kid {}: {}", kid, err);
            }
        }
    }
    keys
}

/// Key resolver over a fixed, inline key set
#[derive(Debug, Clone)]
pub struct StaticKeyResolver {
    keys: HashMap<String, ResolvedKey>,
}

impl StaticKeyResolver {
    /// Build a resolver from a JSON encoded JWK set
    pub fn from_json(jwks_json: &str) -> Result<Self> {
        let jwk_set: JwkSet = serde_json::from_str(jwks_json)
            .map_err(|e| AuthzError::Config(format!("Could not parse inline JWKS: {}", e)))?;
        Self::from_jwk_set(&jwk_set)
    }

    /// Build a resolver from an already parsed JWK set
    pub fn from_jwk_set(jwk_set: &JwkSet) -> Result<Self> {
        let keys = parse_jwk_set(jwk_set);
        if keys.is_empty() {
            return Err(AuthzError::Config(
                "Inline JWKS contains no usable keys".to_string(),
            ));
        }
        Ok(Self { keys })
    }

    /// Key identifiers served by this resolver
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve_key(&self, kid: &str) -> Result<ResolvedKey> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthzError::KeyResolution(format!("No key found for kid: {}", kid)))
    }
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, ResolvedKey>,
    fetched_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

/// Key resolver backed by a remote JWKS endpoint
///
/// Keys are cached for `refresh_interval`. A token naming an unknown `kid`
/// triggers a refetch at most once per `refresh_rate_limit`. When a refetch
/// fails the previously fetched keys keep being served.
pub struct JwksKeyResolver {
    jwks_uri: String,
    http_client: Client,
    options: JwksRefreshOptions,
    cache: RwLock<KeyCache>,
}

impl JwksKeyResolver {
    /// Create a resolver without fetching anything yet
    pub fn new(jwks_uri: impl Into<String>, options: JwksRefreshOptions) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(options.refresh_timeout)
            .build()?;
        Ok(Self {
            jwks_uri: jwks_uri.into(),
            http_client,
            options,
            cache: RwLock::new(KeyCache::default()),
        })
    }

    /// Create a resolver and perform the initial fetch
    ///
    /// Fails when the endpoint is unreachable or serves no usable keys.
    pub async fn connect(jwks_uri: impl Into<String>, options: JwksRefreshOptions) -> Result<Self> {
        let resolver = Self::new(jwks_uri, options)?;
        let count = resolver.refresh().await?;
        if count == 0 {
            return Err(AuthzError::JwksFetch(format!(
                "JWKS at {} contains no usable keys",
                resolver.jwks_uri
            )));
        }
        Ok(resolver)
    }

    /// The endpoint keys are fetched from
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, ResolvedKey>> {
        tracing::debug!("Fetching JWKS from: {}", self.jwks_uri);

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthzError::JwksFetch(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthzError::JwksFetch(format!(
                "JWKS fetch failed with status: {}",
                response.status()
            )));
        }

        let jwks_text = response
            .text()
            .await
            .map_err(|e| AuthzError::JwksFetch(format!("Failed to read JWKS response: {}", e)))?;

        let jwk_set: JwkSet = serde_json::from_str(&jwks_text)
            .map_err(|e| AuthzError::JwksFetch(format!("Failed to parse JWKS: {}", e)))?;

        Ok(parse_jwk_set(&jwk_set))
    }

    /// Refetch the key set unconditionally, returning the number of usable keys
    pub async fn refresh(&self) -> Result<usize> {
        self.cache.write().await.last_attempt = Some(Instant::now());
        let keys = self.fetch_keys().await?;
        let count = keys.len();

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        Ok(count)
    }

    /// Refresh the key set on a timer until the returned task is aborted
    pub fn spawn_refresh(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.options.refresh_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if let Err(e) = self.refresh().await {
                    tracing::warn!("Background JWKS refresh from {} failed: {}", self.jwks_uri, e);
                }
            }
        })
    }

    fn is_fresh(&self, cache: &KeyCache) -> bool {
        cache
            .fetched_at
            .is_some_and(|t| t.elapsed() < self.options.refresh_interval)
    }

    fn attempt_allowed(&self, cache: &KeyCache) -> bool {
        cache
            .last_attempt
            .map_or(true, |t| t.elapsed() >= self.options.refresh_rate_limit)
    }

    /// Decide under the write lock whether this caller should refetch
    async fn claim_refresh(&self, kid: &str) -> bool {
        let mut cache = self.cache.write().await;
        let fresh = self.is_fresh(&cache);
        let unknown = !cache.keys.contains_key(kid);
        let wanted = !fresh || (unknown && self.options.refresh_unknown_kid);
        if wanted && self.attempt_allowed(&cache) {
            cache.last_attempt = Some(Instant::now());
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    async fn seed(&self, keys: HashMap<String, ResolvedKey>) {
        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        cache.last_attempt = Some(Instant::now());
    }
}

#[async_trait]
impl KeyResolver for JwksKeyResolver {
    async fn resolve_key(&self, kid: &str) -> Result<ResolvedKey> {
        {
            let cache = self.cache.read().await;
            if self.is_fresh(&cache) {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        if self.claim_refresh(kid).await {
            match self.fetch_keys().await {
                Ok(keys) => {
                    let mut cache = self.cache.write().await;
                    cache.keys = keys;
                    cache.fetched_at = Some(Instant::now());
                }
                Err(e) => {
                    tracing::warn!("JWKS refresh failed, serving cached keys: {}", e);
                }
            }
        }

        let cache = self.cache.read().await;
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthzError::KeyResolution(format!("No key found for kid: {}", kid)))
    }
}
