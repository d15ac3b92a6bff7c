//! Token minting helpers and a local JWKS endpoint shared by the unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::auth::policy::PermissionPolicy;
use crate::auth::verifier::TokenVerifier;
use crate::oidc::keys::StaticKeyResolver;

pub const SECRET: &[u8] = b"unit-test-hmac-key-for-bearer-authz-checks";
pub const KID: &str = "hmac-1";
pub const AUDIENCE: &str = "tornjak-backend";
pub const ROLE_CLAIM: &str = "realm_access.roles";

/// Second key published after a rotation
pub const ROTATED_SECRET: &[u8] = b"rotated-hmac-key-for-bearer-authz-checks!!";
pub const ROTATED_KID: &str = "hmac-2";

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// JWK set publishing one HS256 key per `(kid, secret)` pair
pub fn jwks_json_with(keys: &[(&str, &[u8])]) -> String {
    let keys: Vec<Value> = keys
        .iter()
        .map(|(kid, secret)| {
            json!({
                "kty": "oct",
                "kid": kid,
                "alg": "HS256",
                "use": "sig",
                "k": URL_SAFE_NO_PAD.encode(secret),
            })
        })
        .collect();
    json!({ "keys": keys }).to_string()
}

pub fn jwks_json() -> String {
    jwks_json_with(&[(KID, SECRET)])
}

/// Key set after rotating in [`ROTATED_KID`]
pub fn rotated_jwks_json() -> String {
    jwks_json_with(&[(KID, SECRET), (ROTATED_KID, ROTATED_SECRET)])
}

pub fn verifier() -> TokenVerifier {
    let resolver = StaticKeyResolver::from_json(&jwks_json()).unwrap();
    TokenVerifier::new(
        PermissionPolicy::builtin(),
        AUDIENCE,
        ROLE_CLAIM,
        Arc::new(resolver),
    )
}

/// Claims of a valid token carrying `roles` in the realm role claim
pub fn claims_with_roles(roles: &[&str]) -> Value {
    json!({
        "sub": "user-1",
        "iss": "https://keycloak.example.com/realms/tornjak",
        "aud": AUDIENCE,
        "exp": now() + 300,
        "iat": now(),
        "realm_access": { "roles": roles },
    })
}

pub fn sign_with(claims: &Value, kid: Option<&str>, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}

pub fn sign(claims: &Value) -> String {
    sign_with(claims, Some(KID), SECRET)
}

pub fn bearer(token: &str) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    headers.insert(
        http::header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    headers
}

#[derive(Clone)]
struct IssuerState {
    issuer: String,
    jwks: Arc<Mutex<String>>,
    failing: Arc<AtomicBool>,
    jwks_hits: Arc<AtomicUsize>,
}

async fn openid_configuration(State(state): State<IssuerState>) -> Json<Value> {
    Json(json!({
        "issuer": state.issuer,
        "jwks_uri": format!("{}/certs", state.issuer),
    }))
}

async fn certs(State(state): State<IssuerState>) -> Response {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    if state.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let body = state.jwks.lock().unwrap().clone();
    ([(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// OIDC issuer on a local port serving discovery and a swappable JWKS
pub struct TestIssuer {
    state: IssuerState,
    server: JoinHandle<()>,
}

impl TestIssuer {
    pub async fn start(jwks: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let issuer = format!("http://{}", listener.local_addr().unwrap());
        let state = IssuerState {
            issuer,
            jwks: Arc::new(Mutex::new(jwks)),
            failing: Arc::new(AtomicBool::new(false)),
            jwks_hits: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(openid_configuration))
            .route("/certs", get(certs))
            .with_state(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state, server }
    }

    pub fn issuer_url(&self) -> &str {
        &self.state.issuer
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/certs", self.state.issuer)
    }

    /// Replace the served key set
    pub fn publish(&self, jwks: String) {
        *self.state.jwks.lock().unwrap() = jwks;
    }

    /// Answer JWKS requests with a 500 while set
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of JWKS requests received so far
    pub fn jwks_hits(&self) -> usize {
        self.state.jwks_hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestIssuer {
    fn drop(&mut self) {
        self.server.abort();
    }
}
