//! # Discovery Types
//!
//! Wire shapes for OpenID Connect Discovery 1.0 metadata and JWK Sets, the
//! validated [`DiscoveryDocument`] built from them, and fetch settings.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DiscoveryError;

/// Placeholder some multi-tenant providers publish in the `issuer` field
pub const TENANT_PLACEHOLDER: &str = "{tenantid}";

/// Configuration for discovery fetches and caching
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// TTL when the response carries no cache headers (default: 10 minutes)
    pub default_ttl: Duration,

    /// Upper bound for `Cache-Control: max-age` (default: 24 hours)
    pub max_ttl: Duration,

    /// Minimum time between forced key refreshes (default: 5 seconds)
    pub min_refresh_interval: Duration,

    /// Per-request timeout (default: 10 seconds)
    pub request_timeout: Duration,

    /// Maximum response body size in bytes (default: 256 KiB)
    pub max_response_size: usize,

    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            max_ttl: Duration::from_secs(86400),
            min_refresh_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_response_size: 256 * 1024,
            user_agent: format!("scopegate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// OpenID Connect provider metadata
///
/// Only `issuer` and `jwks_uri` are consumed. Both are optional here so that
/// a document lacking them reports [`DiscoveryError::MissingField`] rather
/// than a generic parse error.
///
/// ```json
/// {
///   "issuer": "https://login.example.com/{tenantid}/v2.0",
///   "jwks_uri": "https://login.example.com/common/discovery/v2.0/keys",
///   "id_token_signing_alg_values_supported": ["RS256"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderMetadata {
    /// Issuer identifier, possibly templated with `{tenantid}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// URL of the provider's JWK Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Everything else the provider publishes
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Extract the issuer for `tenant_id` and the key set location
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MissingField`] if either field is absent or
    /// blank.
    pub fn resolve(self, tenant_id: &str) -> Result<(String, String), DiscoveryError> {
        let issuer = non_blank(self.issuer).ok_or(DiscoveryError::MissingField("issuer"))?;
        let jwks_uri = non_blank(self.jwks_uri).ok_or(DiscoveryError::MissingField("jwks_uri"))?;

        Ok((issuer.replace(TENANT_PLACEHOLDER, tenant_id), jwks_uri))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Raw JWK Set; keys are parsed one at a time so that a single unsupported
/// key does not poison the whole set
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawKeySet {
    #[serde(default)]
    pub keys: Vec<serde_json::Value>,
}

impl RawKeySet {
    /// Keep keys whose `use` is absent or `sig` and that parse as a JWK
    pub(crate) fn into_signing_keys(self, jwks_uri: &str) -> Result<JwkSet, DiscoveryError> {
        let keys: Vec<Jwk> = self
            .keys
            .into_iter()
            .filter(|key| matches!(key.get("use").and_then(|u| u.as_str()), None | Some("sig")))
            .filter_map(|key| match serde_json::from_value::<Jwk>(key) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    debug!(jwks_uri = %jwks_uri, error = %e, "Skipping unsupported JWK");
                    None
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(DiscoveryError::NoSigningKeys(jwks_uri.to_string()));
        }
        Ok(JwkSet { keys })
    }
}

/// Validated identity provider metadata plus its signing keys
#[derive(Debug, Clone)]
pub struct DiscoveryDocument {
    /// Issuer every token must carry, tenant placeholder already substituted
    pub issuer: String,

    /// Where the signing keys were fetched from
    pub jwks_uri: String,

    /// Keys usable for signature verification
    pub signing_keys: JwkSet,

    /// When the document was fetched
    pub fetched_at: SystemTime,
}

impl DiscoveryDocument {
    /// Whether a key with this id is published
    pub fn has_key(&self, kid: &str) -> bool {
        self.signing_keys.find(kid).is_some()
    }

    /// Published key ids, in document order
    pub fn key_ids(&self) -> Vec<&str> {
        self.signing_keys
            .keys
            .iter()
            .filter_map(|jwk| jwk.common.key_id.as_deref())
            .collect()
    }
}
