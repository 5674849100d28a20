//! # Discovery Document Fetcher
//!
//! HTTP side of discovery: fetches the OpenID Connect configuration for the
//! tenant, then the JWK Set it points at, with size limits, timeouts and
//! Cache-Control handling. Caching lives in [`super::DiscoveryCache`].

use std::time::{Duration, SystemTime};

use reqwest::header::{CACHE_CONTROL, HeaderMap};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::{Host, Url};

use super::types::{DiscoveryConfig, DiscoveryDocument, ProviderMetadata, RawKeySet};
use crate::error::{ConfigurationError, DiscoveryError};

/// A fetched document together with how long it may be cached
#[derive(Debug)]
pub(crate) struct Fetched {
    pub document: DiscoveryDocument,
    pub ttl: Duration,
}

/// Fetches discovery metadata and signing keys for one tenant
#[derive(Debug, Clone)]
pub(crate) struct DiscoveryFetcher {
    client: reqwest::Client,
    config: DiscoveryConfig,
    discovery_url: String,
    tenant_id: String,
}

impl DiscoveryFetcher {
    pub(crate) fn new(
        discovery_url: String,
        tenant_id: String,
        config: DiscoveryConfig,
    ) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config,
            discovery_url,
            tenant_id,
        })
    }

    pub(crate) fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub(crate) fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    /// Fetch the discovery document, then the key set it references
    pub(crate) async fn fetch(&self) -> Result<Fetched, DiscoveryError> {
        let (metadata, ttl): (ProviderMetadata, Duration) =
            self.get_json(&self.discovery_url).await?;
        let (issuer, jwks_uri) = metadata.resolve(&self.tenant_id)?;

        let (raw_keys, keys_ttl): (RawKeySet, Duration) = self.get_json(&jwks_uri).await?;
        let signing_keys = raw_keys.into_signing_keys(&jwks_uri)?;
        // Keys and metadata are cached together; the shorter lifetime wins
        let ttl = ttl.min(keys_ttl);

        info!(
            issuer = %issuer,
            jwks_uri = %jwks_uri,
            keys = signing_keys.keys.len(),
            ttl_secs = ttl.as_secs(),
            "Fetched discovery document and signing keys"
        );

        Ok(Fetched {
            document: DiscoveryDocument {
                issuer,
                jwks_uri,
                signing_keys,
                fetched_at: SystemTime::now(),
            },
            ttl,
        })
    }

    /// GET a JSON document, returning it with its cache TTL
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<(T, Duration), DiscoveryError> {
        ensure_secure(url)?;
        debug!(url = %url, "Fetching");

        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DiscoveryError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let ttl = cache_ttl(response.headers(), &self.config);
        let limit = self.config.max_response_size;
        let too_large = || DiscoveryError::ResponseTooLarge {
            url: url.to_string(),
            limit,
        };

        if let Some(content_length) = response.content_length()
            && content_length > limit as u64
        {
            return Err(too_large());
        }

        // Content-Length can be absent or wrong; enforce the limit on the stream
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| DiscoveryError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })? {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let parsed = serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidJson {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok((parsed, ttl))
    }
}

/// Require HTTPS, except for loopback hosts
pub(crate) fn ensure_secure(url: &str) -> Result<(), DiscoveryError> {
    let parsed = Url::parse(url).map_err(|e| DiscoveryError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&parsed) => Ok(()),
        _ => Err(DiscoveryError::InsecureUrl(url.to_string())),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// TTL from `Cache-Control`, falling back to the configured default
///
/// `no-store` and `no-cache` win over `max-age`; `max-age` is capped at
/// `max_ttl`.
pub(crate) fn cache_ttl(headers: &HeaderMap, config: &DiscoveryConfig) -> Duration {
    let Some(value) = headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()) else {
        return config.default_ttl;
    };

    let directives: Vec<String> = value
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .collect();

    if directives.iter().any(|d| d == "no-store" || d == "no-cache") {
        return Duration::ZERO;
    }

    directives
        .iter()
        .find_map(|d| d.strip_prefix("max-age=")?.parse::<u64>().ok())
        .map(|seconds| Duration::from_secs(seconds).min(config.max_ttl))
        .unwrap_or(config.default_ttl)
}
