//! Token validation engine
//!
//! [`TokenValidationEngine`] ties the pieces together for one trusted tenant:
//!
//! ```text
//! Authorization header
//!   │  strict "Bearer " prefix
//!   ▼
//! DiscoveryCache::get ──▶ SignatureVerifier::verify ──▶ ClaimsValidator::validate
//!                             │ unknown kid                      │
//!                             ▼                                  ▼
//!                     DiscoveryCache::refresh_after      Principal / Rejection
//!                     + verify once more
//! ```
//!
//! One engine is meant to be shared (`Arc`) by every request handler.
//! Results are returned to the caller and never stored on the engine.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use crate::audit::AuditLogger;
use crate::config::TrustConfig;
use crate::discovery::{DiscoveryCache, DiscoveryConfig};
use crate::error::{ConfigurationError, Rejection, RejectionReason, SignatureError};
use crate::jwt::{SignatureVerifier, VerifiedToken};
use crate::principal::Principal;
use crate::validation::ClaimsValidator;

/// Authorization scheme prefix, matched case-sensitively
pub const BEARER_PREFIX: &str = "Bearer ";

/// Result of validating one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every check passed
    Accepted(Principal),
    /// Some check failed; only [`Rejection::kind`] should reach the caller
    Rejected(Rejection),
}

impl ValidationOutcome {
    /// Whether the token was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The principal, if accepted
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Accepted(principal) => Some(principal),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection, if rejected
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<Principal, Rejection> {
        match self {
            Self::Accepted(principal) => Ok(principal),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

impl From<Result<Principal, Rejection>> for ValidationOutcome {
    fn from(result: Result<Principal, Rejection>) -> Self {
        match result {
            Ok(principal) => Self::Accepted(principal),
            Err(rejection) => Self::Rejected(rejection),
        }
    }
}

/// Anything that can turn an `Authorization` header value into an outcome
///
/// The Tower middleware is generic over this trait so that services can be
/// tested with a stub.
#[async_trait]
pub trait BearerValidator: Send + Sync {
    /// Validate a raw `Authorization` header value
    async fn validate(&self, authorization: &str) -> ValidationOutcome;
}

#[async_trait]
impl<T: BearerValidator + ?Sized> BearerValidator for Arc<T> {
    async fn validate(&self, authorization: &str) -> ValidationOutcome {
        (**self).validate(authorization).await
    }
}

/// Extract the token from `Bearer <token>`
///
/// The scheme must be exactly `Bearer` followed by one space; the remainder
/// must be non-empty. No trimming is performed.
pub fn parse_bearer(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

/// Validates bearer tokens for one tenant and audience
///
/// # Example
///
/// ```rust,no_run
/// use scopegate::{TokenValidationEngine, TrustConfig, ValidationOutcome, preferred_user_name};
///
/// # async fn example(header: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let config = TrustConfig::new(
///     "https://login.microsoftonline.com/",
///     "contoso-tenant-id",
///     "api://orders",
/// )?;
/// let engine = TokenValidationEngine::new(config)?;
///
/// match engine.validate(header).await {
///     ValidationOutcome::Accepted(principal) => {
///         println!("hello {}", preferred_user_name(&principal));
///     }
///     ValidationOutcome::Rejected(rejection) => {
///         println!("{:?}", rejection.kind());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenValidationEngine {
    config: TrustConfig,
    discovery: DiscoveryCache,
    verifier: SignatureVerifier,
    claims: ClaimsValidator,
    audit: AuditLogger,
}

impl TokenValidationEngine {
    /// Create an engine with default discovery, algorithm and audit settings
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the discovery client cannot be built.
    pub fn new(config: TrustConfig) -> Result<Self, ConfigurationError> {
        Self::builder(config).build()
    }

    /// Start building an engine with custom settings
    pub fn builder(config: TrustConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            discovery_config: DiscoveryConfig::default(),
            verifier: SignatureVerifier::new(),
            audit: AuditLogger::default(),
        }
    }

    /// Trust configuration
    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Discovery cache, e.g. to pre-warm or invalidate
    pub fn discovery(&self) -> &DiscoveryCache {
        &self.discovery
    }

    /// Validate a raw `Authorization` header value
    ///
    /// Never fails: every problem becomes [`ValidationOutcome::Rejected`].
    pub async fn validate(&self, authorization: &str) -> ValidationOutcome {
        self.validate_at(authorization, SystemTime::now()).await
    }

    /// Validate with an explicit clock, for lifetime checks
    pub async fn validate_at(&self, authorization: &str, now: SystemTime) -> ValidationOutcome {
        match self.authorize(authorization, now).await {
            Ok(principal) => {
                self.audit.record_accepted(&principal);
                ValidationOutcome::Accepted(principal)
            }
            Err(reason) => {
                let rejection = Rejection::from(reason);
                self.audit.record_rejected(&rejection);
                ValidationOutcome::Rejected(rejection)
            }
        }
    }

    async fn authorize(
        &self,
        authorization: &str,
        now: SystemTime,
    ) -> Result<Principal, RejectionReason> {
        let Some(token) = parse_bearer(authorization) else {
            debug!("Authorization header missing or not a bearer token");
            return Err(RejectionReason::MalformedHeader);
        };

        let document = self.discovery.get().await?;

        let (document, verified): (_, VerifiedToken) =
            match self.verifier.verify(token, &document.signing_keys) {
                Ok(verified) => (document, verified),
                Err(SignatureError::UnknownKeyId(kid)) => {
                    debug!(kid = %kid, "Unknown signing key, refreshing key set");
                    let refreshed = self.discovery.refresh_after(&document).await?;
                    let verified = self.verifier.verify(token, &refreshed.signing_keys)?;
                    (refreshed, verified)
                }
                Err(e) => return Err(e.into()),
            };

        self.claims.validate(&verified.claims, &document.issuer, now)?;

        Ok(Principal::new(verified.claims))
    }
}

#[async_trait]
impl BearerValidator for TokenValidationEngine {
    async fn validate(&self, authorization: &str) -> ValidationOutcome {
        TokenValidationEngine::validate(self, authorization).await
    }
}

/// Builder for [`TokenValidationEngine`]
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    config: TrustConfig,
    discovery_config: DiscoveryConfig,
    verifier: SignatureVerifier,
    audit: AuditLogger,
}

impl EngineBuilder {
    /// Discovery fetch and cache settings
    pub fn discovery_config(mut self, discovery_config: DiscoveryConfig) -> Self {
        self.discovery_config = discovery_config;
        self
    }

    /// Signature verifier (algorithm allow-list)
    pub fn verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Audit logger
    pub fn audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the discovery client cannot be built.
    pub fn build(self) -> Result<TokenValidationEngine, ConfigurationError> {
        let discovery = DiscoveryCache::with_config(&self.config, self.discovery_config)?;
        let claims = ClaimsValidator::new(&self.config);

        Ok(TokenValidationEngine {
            config: self.config,
            discovery,
            verifier: self.verifier,
            claims,
            audit: self.audit,
        })
    }
}
