//! Tower Service implementation for bearer-token validation
//!
//! Works with `http::Request<B>` based stacks (Axum, Hyper, Tower-HTTP). The
//! response body type only needs `Default` so that rejections can be answered
//! with an empty body.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::{Request, Response};
use tower_service::Service;
use tracing::debug;

use crate::engine::{BearerValidator, ValidationOutcome};

use super::{BearerAuthConfig, rejection_response};

/// Future type for [`BearerAuthService`] responses
pub type BearerAuthFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Tower Service that validates bearer tokens
///
/// Inserts the [`Principal`](crate::Principal) into request extensions before
/// forwarding accepted requests. Rejected requests never reach the inner
/// service.
#[derive(Debug)]
pub struct BearerAuthService<S, V> {
    inner: S,
    validator: Arc<V>,
    config: BearerAuthConfig,
}

impl<S: Clone, V> Clone for BearerAuthService<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            validator: Arc::clone(&self.validator),
            config: self.config.clone(),
        }
    }
}

impl<S, V> BearerAuthService<S, V> {
    /// Create a new service
    pub fn new(inner: S, validator: Arc<V>, config: BearerAuthConfig) -> Self {
        Self {
            inner,
            validator,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S, V, B, ResBody> Service<Request<B>> for BearerAuthService<S, V>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    V: BearerValidator + 'static,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BearerAuthFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        // Absent or non-ASCII headers validate as empty and are rejected
        let authorization = req
            .headers()
            .get(&self.config.auth_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let validator = Arc::clone(&self.validator);

        Box::pin(async move {
            match validator.validate(&authorization).await {
                ValidationOutcome::Accepted(principal) => {
                    req.extensions_mut().insert(principal);
                    inner.call(req).await
                }
                ValidationOutcome::Rejected(rejection) => {
                    debug!(
                        path = %req.uri().path(),
                        kind = ?rejection.kind(),
                        "Request rejected by bearer auth"
                    );
                    Ok(rejection_response(rejection.kind()))
                }
            }
        })
    }
}
