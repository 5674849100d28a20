//! # Identity Provider Discovery
//!
//! Fetches and caches the tenant's OpenID Connect configuration and the
//! signing keys it references.
//!
//! ## Caching Strategy
//!
//! - One cached [`DiscoveryDocument`] per [`DiscoveryCache`], shared as `Arc`
//! - Respects `Cache-Control` (`max-age`, `no-cache`, `no-store`), default
//!   TTL 10 minutes, capped at 24 hours
//! - Concurrent misses collapse into a single fetch
//! - An unknown `kid` forces one refresh (key rollover), rate limited by
//!   [`DiscoveryConfig::min_refresh_interval`]
//! - A failed fetch never replaces or clears what is cached
//!
//! ## Security
//!
//! - HTTPS only, except loopback hosts
//! - Response size limit (256 KiB) and request timeout (10 s)
//! - Redirects are not followed
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use scopegate::TrustConfig;
//! use scopegate::discovery::DiscoveryCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrustConfig::new(
//!     "https://login.microsoftonline.com/",
//!     "contoso-tenant-id",
//!     "api://orders",
//! )?;
//! let cache = DiscoveryCache::new(&config)?;
//!
//! let document = cache.get().await?;
//! println!("issuer: {}, keys: {:?}", document.issuer, document.key_ids());
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod types;

pub use types::{DiscoveryConfig, DiscoveryDocument, ProviderMetadata, TENANT_PLACEHOLDER};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use url::Url;

use crate::config::TrustConfig;
use crate::error::{ConfigurationError, DiscoveryError};
use fetcher::{DiscoveryFetcher, Fetched};

/// Cached document with its freshness window
#[derive(Debug, Clone)]
struct CachedDocument {
    document: Arc<DiscoveryDocument>,
    fetched: Instant,
    ttl: Duration,
}

impl CachedDocument {
    fn new(fetched: Fetched) -> Self {
        Self {
            document: Arc::new(fetched.document),
            fetched: Instant::now(),
            ttl: fetched.ttl,
        }
    }

    fn is_valid(&self) -> bool {
        self.fetched.elapsed() < self.ttl
    }
}

/// Bookkeeping held while a fetch is in flight
#[derive(Debug, Default)]
struct FetchGate {
    last_forced_refresh: Option<Instant>,
}

/// Single-flight cache of the tenant's discovery document
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct DiscoveryCache {
    fetcher: DiscoveryFetcher,
    cache: RwLock<Option<CachedDocument>>,
    gate: Mutex<FetchGate>,
}

impl DiscoveryCache {
    /// Create a cache for the configured tenant with default settings
    ///
    /// Nothing is fetched until the first [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// See [`with_config`](Self::with_config).
    pub fn new(config: &TrustConfig) -> Result<Self, ConfigurationError> {
        Self::with_config(config, DiscoveryConfig::default())
    }

    /// Create a cache with custom fetch and caching settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidInstance`] if the configured
    /// instance does not yield an absolute discovery URL, and
    /// [`ConfigurationError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_config(
        config: &TrustConfig,
        discovery: DiscoveryConfig,
    ) -> Result<Self, ConfigurationError> {
        let discovery_url = config.discovery_url();
        let parsed = Url::parse(&discovery_url).map_err(|e| ConfigurationError::InvalidInstance {
            instance: config.instance().to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidInstance {
                instance: config.instance().to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        Ok(Self {
            fetcher: DiscoveryFetcher::new(
                discovery_url,
                config.tenant_id().to_string(),
                discovery,
            )?,
            cache: RwLock::new(None),
            gate: Mutex::new(FetchGate::default()),
        })
    }

    /// Discovery endpoint this cache fetches from
    pub fn discovery_url(&self) -> &str {
        self.fetcher.discovery_url()
    }

    /// Current document, fetching it if absent or expired
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if a fetch was needed and failed. The cache
    /// is left as it was, as it is when the returned future is dropped early.
    pub async fn get(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        if let Some(document) = self.fresh().await {
            debug!(issuer = %document.issuer, "Discovery cache hit");
            return Ok(document);
        }

        let waiting_since = Instant::now();
        let _gate = self.gate.lock().await;

        // Another caller may have completed a fetch while we waited
        if let Some(cached) = self.cache.read().await.as_ref()
            && (cached.is_valid() || cached.fetched >= waiting_since)
        {
            return Ok(Arc::clone(&cached.document));
        }

        self.fetch_and_store().await
    }

    /// Force a refresh because `stale` lacked a needed signing key
    ///
    /// Returns the newer document without fetching if another caller already
    /// replaced `stale`. Forced refreshes closer together than
    /// [`DiscoveryConfig::min_refresh_interval`] return the current document
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the refresh fetch failed.
    pub async fn refresh_after(
        &self,
        stale: &Arc<DiscoveryDocument>,
    ) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let mut gate = self.gate.lock().await;

        let current = self.cached().await;
        if let Some(current) = &current
            && !Arc::ptr_eq(current, stale)
        {
            debug!("Discovery document already refreshed by another caller");
            return Ok(Arc::clone(current));
        }

        let interval = self.fetcher.config().min_refresh_interval;
        if let Some(last) = gate.last_forced_refresh
            && last.elapsed() < interval
        {
            debug!(
                since_last_ms = last.elapsed().as_millis() as u64,
                "Forced key refresh rate limited"
            );
            return Ok(current.unwrap_or_else(|| Arc::clone(stale)));
        }

        gate.last_forced_refresh = Some(Instant::now());
        info!(jwks_uri = %stale.jwks_uri, "Refreshing signing keys for unknown key id");
        self.fetch_and_store().await
    }

    /// Drop the cached document; the next [`get`](Self::get) fetches
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        debug!("Discovery cache invalidated");
    }

    /// Cached document, valid or not, without fetching
    pub async fn cached(&self) -> Option<Arc<DiscoveryDocument>> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.document))
    }

    async fn fresh(&self) -> Option<Arc<DiscoveryDocument>> {
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.is_valid())
            .map(|cached| Arc::clone(&cached.document))
    }

    /// Caller must hold the fetch gate
    async fn fetch_and_store(&self) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        match self.fetcher.fetch().await {
            Ok(fetched) => {
                let cached = CachedDocument::new(fetched);
                let document = Arc::clone(&cached.document);
                *self.cache.write().await = Some(cached);
                Ok(document)
            }
            Err(e) => {
                error!(
                    discovery_url = %self.fetcher.discovery_url(),
                    error = %e,
                    "Discovery fetch failed"
                );
                Err(e)
            }
        }
    }
}
