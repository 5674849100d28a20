//! Tower Layer implementation for bearer-token validation

use std::sync::Arc;
use tower::Layer;

use crate::engine::BearerValidator;

use super::BearerAuthConfig;
use super::service::BearerAuthService;

/// Tower Layer that adds bearer-token validation to services
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use scopegate::tower::BearerAuthLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(BearerAuthLayer::new(engine))
///     .service(my_inner_service);
/// ```
#[derive(Debug)]
pub struct BearerAuthLayer<V> {
    validator: Arc<V>,
    config: BearerAuthConfig,
}

// Manual impl: cloning only bumps the Arc, V need not be Clone
impl<V> Clone for BearerAuthLayer<V> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            config: self.config.clone(),
        }
    }
}

impl<V> BearerAuthLayer<V>
where
    V: BearerValidator,
{
    /// Create a layer with default configuration
    pub fn new(validator: V) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    /// Create a layer from a shared validator
    pub fn from_arc(validator: Arc<V>) -> Self {
        Self {
            validator,
            config: BearerAuthConfig::default(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn config(mut self, config: BearerAuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a path that bypasses validation
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }
}

impl<S, V> Layer<S> for BearerAuthLayer<V> {
    type Service = BearerAuthService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService::new(inner, Arc::clone(&self.validator), self.config.clone())
    }
}
