//! Trust Configuration Types
//!
//! [`TrustConfig`] is the immutable description of whom the validator trusts
//! and what it requires: the identity provider instance, the tenant, the API's
//! audience identifier and the scope every caller must hold.
//!
//! [`TrustSettings`] is the loosely typed shape configuration loaders produce
//! (environment, files). Converting it into a [`TrustConfig`] fails fast when a
//! required identifier is missing, so a misconfigured service never starts
//! serving requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::error::ConfigurationError;

/// Scope required when none is configured
pub const DEFAULT_REQUIRED_SCOPE: &str = "access_as_user";

/// Path appended to the issuer template to reach the discovery document
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Immutable token validation configuration
///
/// # Example
///
/// ```rust
/// use scopegate::TrustConfig;
///
/// let config = TrustConfig::new(
///     "https://login.microsoftonline.com/",
///     "contoso-tenant-id",
///     "api://contoso-orders",
/// )?;
///
/// assert_eq!(
///     config.issuer_template(),
///     "https://login.microsoftonline.com/contoso-tenant-id/v2.0"
/// );
/// assert_eq!(config.required_scope(), "access_as_user");
/// # Ok::<(), scopegate::ConfigurationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    /// Identity provider base URL, always ending in `/`
    instance: String,
    /// Tenant (directory) identifier
    tenant_id: String,
    /// Expected `aud` claim
    audience: String,
    /// Scope every token must carry
    required_scope: String,
    /// Extra tolerance applied to `exp` and `nbf`
    clock_skew: Duration,
}

impl TrustConfig {
    /// Create a configuration from the three required identifiers
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingField`] if any identifier is blank.
    /// The instance URL itself is checked when the discovery cache is built.
    pub fn new(
        instance: impl Into<String>,
        tenant_id: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let instance = required("instance", instance.into())?;
        let tenant_id = required("tenant_id", tenant_id.into())?;
        let audience = required("audience", audience.into())?;

        Ok(Self {
            instance: with_trailing_slash(instance),
            tenant_id,
            audience,
            required_scope: DEFAULT_REQUIRED_SCOPE.to_string(),
            clock_skew: Duration::ZERO,
        })
    }

    /// Replace the required scope
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingField`] if `scope` is blank.
    pub fn with_required_scope(
        mut self,
        scope: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        self.required_scope = required("required_scope", scope.into())?;
        Ok(self)
    }

    /// Set the clock skew tolerance applied to `exp` and `nbf` (default: none)
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Identity provider base URL (with trailing slash)
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Tenant identifier
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Expected audience
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Required scope
    pub fn required_scope(&self) -> &str {
        &self.required_scope
    }

    /// Clock skew tolerance
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Authority the tenant's tokens are issued under: `{instance}{tenant}/v2.0`
    pub fn issuer_template(&self) -> String {
        format!("{}{}/v2.0", self.instance, self.tenant_id)
    }

    /// Well-known discovery endpoint for the tenant
    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.issuer_template(), DISCOVERY_PATH)
    }
}

/// Raw settings as read from a configuration source
///
/// Every field is optional so that loaders can deserialize partial input;
/// [`TrustConfig::try_from`] reports the first missing identifier.
///
/// ```rust
/// use scopegate::{TrustConfig, TrustSettings};
///
/// let settings: TrustSettings = serde_json::from_value(serde_json::json!({
///     "instance": "https://login.microsoftonline.com/",
///     "tenant_id": "contoso",
///     "audience": "api://orders",
///     "clock_skew_secs": 30
/// }))?;
///
/// let config = TrustConfig::try_from(settings)?;
/// assert_eq!(config.clock_skew().as_secs(), 30);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSettings {
    /// Identity provider base URL
    #[serde(default)]
    pub instance: Option<String>,
    /// Tenant identifier
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Audience (application identifier)
    #[serde(default)]
    pub audience: Option<String>,
    /// Required scope (default: `access_as_user`)
    #[serde(default = "default_required_scope")]
    pub required_scope: String,
    /// Clock skew tolerance in seconds (default: 0)
    #[serde(default)]
    pub clock_skew_secs: u64,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            instance: None,
            tenant_id: None,
            audience: None,
            required_scope: default_required_scope(),
            clock_skew_secs: 0,
        }
    }
}

fn default_required_scope() -> String {
    DEFAULT_REQUIRED_SCOPE.to_string()
}

impl TryFrom<TrustSettings> for TrustConfig {
    type Error = ConfigurationError;

    fn try_from(settings: TrustSettings) -> Result<Self, Self::Error> {
        let instance = settings
            .instance
            .ok_or(ConfigurationError::MissingField("instance"))?;
        let tenant_id = settings
            .tenant_id
            .ok_or(ConfigurationError::MissingField("tenant_id"))?;
        let audience = settings
            .audience
            .ok_or(ConfigurationError::MissingField("audience"))?;

        Ok(TrustConfig::new(instance, tenant_id, audience)?
            .with_required_scope(settings.required_scope)?
            .with_clock_skew(Duration::from_secs(settings.clock_skew_secs)))
    }
}

fn required(field: &'static str, value: String) -> Result<String, ConfigurationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn with_trailing_slash(instance: String) -> String {
    if instance.ends_with('/') {
        instance
    } else {
        format!("{instance}/")
    }
}
