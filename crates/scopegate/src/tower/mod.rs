//! # Tower Middleware Integration
//!
//! Tower Layer and Service that protect an HTTP service with bearer-token
//! validation.
//!
//! ## Overview
//!
//! - [`BearerAuthLayer`] - wraps services with [`BearerAuthService`]
//! - [`BearerAuthService`] - reads the `Authorization` header, runs a
//!   [`BearerValidator`](crate::BearerValidator) and either forwards the
//!   request or answers itself
//!
//! ## Responses
//!
//! | Outcome | Response |
//! |---------|----------|
//! | Accepted | inner service, with the [`Principal`](crate::Principal) in request extensions |
//! | Unauthenticated | `401`, `WWW-Authenticate: Bearer error="invalid_token"` |
//! | Forbidden (scope) | `403`, `WWW-Authenticate: Bearer error="insufficient_scope"` |
//!
//! Rejection bodies are empty; the failure reason is only logged.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//! use scopegate::tower::BearerAuthLayer;
//!
//! let engine = Arc::new(TokenValidationEngine::new(config)?);
//!
//! let service = ServiceBuilder::new()
//!     .layer(BearerAuthLayer::from_arc(engine).bypass_path("/health"))
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! ```rust,ignore
//! if let Some(principal) = req.extensions().get::<Principal>() {
//!     println!("Authenticated user: {}", preferred_user_name(principal));
//! }
//! ```

mod layer;
mod service;

pub use layer::BearerAuthLayer;
pub use service::{BearerAuthFuture, BearerAuthService};

use http::header::{AUTHORIZATION, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use http::{Response, StatusCode};

use crate::error::RejectionKind;

/// Configuration for the bearer auth layer
#[derive(Debug, Clone)]
pub struct BearerAuthConfig {
    /// Header the token is read from (default: `Authorization`)
    pub auth_header: HeaderName,
    /// Request paths forwarded without validation (e.g. health checks)
    pub bypass_paths: Vec<String>,
}

impl Default for BearerAuthConfig {
    fn default() -> Self {
        Self {
            auth_header: AUTHORIZATION,
            bypass_paths: Vec::new(),
        }
    }
}

impl BearerAuthConfig {
    /// Add a path that bypasses validation
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Set the header name the token is read from
    #[must_use]
    pub fn auth_header(mut self, header: HeaderName) -> Self {
        self.auth_header = header;
        self
    }

    /// Check if a path should bypass validation (exact match)
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}

/// Status code for a rejection kind
pub fn status_for(kind: RejectionKind) -> StatusCode {
    match kind {
        RejectionKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        RejectionKind::Forbidden => StatusCode::FORBIDDEN,
    }
}

/// Empty-bodied rejection response with the matching challenge
pub fn rejection_response<B: Default>(kind: RejectionKind) -> Response<B> {
    let challenge = match kind {
        RejectionKind::Unauthenticated => r#"Bearer error="invalid_token""#,
        RejectionKind::Forbidden => r#"Bearer error="insufficient_scope""#,
    };

    let mut response = Response::new(B::default());
    *response.status_mut() = status_for(kind);
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}
