use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::Layer;
use tower::Service;

use super::verifier::TokenVerifier;
use crate::axum_integration::VerifiedClaims;

/// Middleware layer enforcing a [`TokenVerifier`]'s policy on every request
///
/// Denied requests never reach the inner service; they are answered with
/// `401` or `403`. Accepted requests on protected paths carry
/// [`VerifiedClaims`] in their extensions.
#[derive(Clone)]
pub struct RequirePolicy {
    verifier: Arc<TokenVerifier>,
}

impl RequirePolicy {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S> Layer<S> for RequirePolicy {
    type Service = RequirePolicyMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePolicyMiddleware {
            inner,
            verifier: self.verifier.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequirePolicyMiddleware<S> {
    inner: S,
    verifier: Arc<TokenVerifier>,
}

impl<S> Service<Request> for RequirePolicyMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // the clone is not ready yet, keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            match verifier.authorize(parts.uri.path(), &parts.headers).await {
                Ok(claims) => {
                    if let Some(claims) = claims {
                        parts.extensions.insert(VerifiedClaims(claims));
                    }
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(reason) => {
                    tracing::debug!(path = parts.uri.path(), %reason, "Request denied");
                    Ok(reason.into_response())
                }
            }
        })
    }
}
