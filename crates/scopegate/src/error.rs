//! Error taxonomy for token validation
//!
//! Each concern owns a typed error:
//!
//! - [`ConfigurationError`] - construction-time, fatal
//! - [`DiscoveryError`] - identity provider metadata could not be obtained
//! - [`SignatureError`] - the token is not a well-formed, correctly signed JWS
//! - [`ClaimValidationError`] - issuer, audience or lifetime mismatch
//! - [`ScopeRejected`] - authenticated, but the required permission is absent
//!
//! Per-token failures are folded into [`RejectionReason`] and wrapped in a
//! [`Rejection`]. Callers only see [`Rejection::kind`]; the detailed reason
//! exists for audit logging and must not be echoed back to clients.

use jsonwebtoken::Algorithm;
use std::fmt;
use thiserror::Error;

/// Configuration errors raised while building a validator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required identifier is absent or blank
    #[error("missing required configuration value: {0}")]
    MissingField(&'static str),

    /// The identity provider instance is not an absolute URL
    #[error("invalid identity provider instance '{instance}': {reason}")]
    InvalidInstance {
        /// The configured value
        instance: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client used for discovery could not be built
    #[error("failed to build discovery client: {0}")]
    HttpClient(String),
}

/// Failures while fetching or parsing discovery metadata and signing keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The endpoint URL could not be parsed
    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The endpoint does not use HTTPS and is not a loopback address
    #[error("endpoint must use https: {0}")]
    InsecureUrl(String),

    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("request to {url} failed: {reason}")]
    Http {
        /// Requested URL
        url: String,
        /// Transport error
        reason: String,
    },

    /// The endpoint answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body exceeded the configured limit
    #[error("response from {url} exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Requested URL
        url: String,
        /// Configured limit in bytes
        limit: usize,
    },

    /// The response body is not the expected JSON document
    #[error("invalid JSON from {url}: {reason}")]
    InvalidJson {
        /// Requested URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// A mandatory discovery field is missing or empty
    #[error("discovery document is missing '{0}'")]
    MissingField(&'static str),

    /// The key set contains no key usable for signature verification
    #[error("key set at {0} contains no signing keys")]
    NoSigningKeys(String),
}

/// Failures while verifying the token signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Not a compact JWS, or the header could not be decoded
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The header declares an algorithm outside the allow-list
    #[error("algorithm {0:?} is not allowed")]
    DisallowedAlgorithm(Algorithm),

    /// The header carries no key id
    #[error("token header has no key id")]
    MissingKeyId,

    /// No published signing key has the token's key id
    #[error("no signing key with id '{0}'")]
    UnknownKeyId(String),

    /// The published key is bound to a different algorithm
    #[error("key '{kid}' is bound to {expected}, token uses {actual:?}")]
    AlgorithmMismatch {
        /// Key id
        kid: String,
        /// Algorithm declared by the key
        expected: String,
        /// Algorithm declared by the token
        actual: Algorithm,
    },

    /// The published key could not be turned into a verification key
    #[error("key '{kid}' is unusable: {reason}")]
    InvalidKey {
        /// Key id
        kid: String,
        /// Conversion error
        reason: String,
    },

    /// Signature verification failed
    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    /// The verified payload is not a JSON object
    #[error("token payload is not a claim object: {0}")]
    InvalidPayload(String),
}

/// Issuer, audience and lifetime failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimValidationError {
    /// No `iss` claim
    #[error("token has no issuer")]
    MissingIssuer,

    /// `iss` differs from the discovered issuer
    #[error("issuer '{actual}' does not match '{expected}'")]
    IssuerMismatch {
        /// Issuer published by the identity provider
        expected: String,
        /// Issuer found in the token
        actual: String,
    },

    /// No `aud` claim
    #[error("token has no audience")]
    MissingAudience,

    /// No `aud` value equals the configured audience
    #[error("audience {actual:?} does not include '{expected}'")]
    AudienceMismatch {
        /// Configured audience
        expected: String,
        /// Audiences found in the token
        actual: Vec<String>,
    },

    /// No `exp` claim
    #[error("token has no expiry")]
    MissingExpiry,

    /// `exp` is in the past
    #[error("token expired at {expired_at}")]
    Expired {
        /// Expiry as seconds since the epoch
        expired_at: i64,
    },

    /// `nbf` is in the future
    #[error("token not valid before {not_before}")]
    NotYetValid {
        /// Not-before as seconds since the epoch
        not_before: i64,
    },

    /// A time claim is not a NumericDate
    #[error("claim '{claim}' is not a timestamp: '{value}'")]
    InvalidTimestamp {
        /// Claim type
        claim: &'static str,
        /// Raw value
        value: String,
    },
}

/// The token is valid but does not grant the required scope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required scope '{required}' not granted")]
pub struct ScopeRejected {
    /// Scope the API requires
    pub required: String,
    /// Scope claim value found in the token, if any
    pub found: Option<String>,
}

/// Why a token was rejected (internal detail, for logs and audit only)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// Header missing, empty or not using the `Bearer` scheme
    #[error("malformed authorization header")]
    MalformedHeader,

    /// The identity provider metadata is unavailable
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Signature verification failed
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Issuer, audience or lifetime check failed
    #[error(transparent)]
    Claims(#[from] ClaimValidationError),

    /// Required scope missing
    #[error(transparent)]
    Scope(#[from] ScopeRejected),
}

impl RejectionReason {
    /// Short, stable label for metrics and audit records
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed_header",
            Self::Discovery(_) => "discovery",
            Self::Signature(_) => "signature",
            Self::Claims(_) => "claims",
            Self::Scope(_) => "scope",
        }
    }
}

/// Caller-facing classification of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// No trustworthy identity could be established (HTTP 401)
    Unauthenticated,
    /// Authenticated, but not authorized for this API (HTTP 403)
    Forbidden,
}

/// A rejected validation
///
/// `Display` is deliberately uniform so that formatting a rejection into a
/// response never reveals which check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    reason: RejectionReason,
}

impl Rejection {
    /// Wrap a rejection reason
    pub fn new(reason: impl Into<RejectionReason>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Classification safe to expose to the caller
    pub fn kind(&self) -> RejectionKind {
        match self.reason {
            RejectionReason::Scope(_) => RejectionKind::Forbidden,
            _ => RejectionKind::Unauthenticated,
        }
    }

    /// Detailed reason, for internal logging only
    pub fn reason(&self) -> &RejectionReason {
        &self.reason
    }

    /// Consume the rejection, returning the detailed reason
    pub fn into_reason(self) -> RejectionReason {
        self.reason
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request is not authorized")
    }
}

impl std::error::Error for Rejection {}

impl From<RejectionReason> for Rejection {
    fn from(reason: RejectionReason) -> Self {
        Self { reason }
    }
}
