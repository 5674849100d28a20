//! # Scopegate - Bearer Token Validation for Protected APIs
//!
//! Validates OAuth 2.0 / OpenID Connect access tokens presented to an API by
//! a single trusted identity provider tenant, and decides whether the caller
//! holds the scope the API requires.
//!
//! ## Design Principles
//!
//! - **Return, don't store**: `validate` returns the [`Principal`]; nothing
//!   per-request lives on the shared engine
//! - **Uniform outside, precise inside**: callers see 401/403 only, audit logs
//!   see the exact [`RejectionReason`]
//! - **Explicit configuration**: everything comes from a [`TrustConfig`]
//!   passed to the constructor
//!
//! ## Architecture
//!
//! - [`config`] - [`TrustConfig`] and the deserializable [`TrustSettings`]
//! - [`discovery`] - single-flight cache of the OIDC discovery document and
//!   signing keys, with TTL and key-rollover refresh
//! - [`jwt`] - claim sets and JWS signature verification
//! - [`validation`] - issuer, audience, lifetime and scope checks
//! - [`engine`] - [`TokenValidationEngine`], the entry point
//! - [`audit`] - one structured event per validation
//! - [`tower`] - Tower layer mapping outcomes to HTTP responses (feature
//!   `middleware`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scopegate::{TokenValidationEngine, TrustConfig, ValidationOutcome, preferred_user_name};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrustConfig::new(
//!     "https://login.microsoftonline.com/",
//!     "contoso-tenant-id",
//!     "api://contoso-orders",
//! )?;
//! let engine = TokenValidationEngine::new(config)?;
//!
//! match engine.validate("Bearer eyJhbGciOi...").await {
//!     ValidationOutcome::Accepted(principal) => {
//!         println!("hello {}", preferred_user_name(&principal));
//!     }
//!     ValidationOutcome::Rejected(rejection) => {
//!         // Only the kind leaves the process
//!         println!("rejected: {:?}", rejection.kind());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower layer and service
//!
//! ## Standards
//!
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7517** - JSON Web Key (JWK)
//! - **RFC 6750** - Bearer Token Usage (`WWW-Authenticate` challenges)
//! - **OpenID Connect Discovery 1.0**

pub mod audit;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod jwt;
pub mod principal;
pub mod validation;

#[cfg(feature = "middleware")]
pub mod tower;

#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use config::{DEFAULT_REQUIRED_SCOPE, TrustConfig, TrustSettings};

#[doc(inline)]
pub use engine::{
    BearerValidator, EngineBuilder, TokenValidationEngine, ValidationOutcome, parse_bearer,
};

#[doc(inline)]
pub use error::{
    ClaimValidationError, ConfigurationError, DiscoveryError, Rejection, RejectionKind,
    RejectionReason, ScopeRejected, SignatureError,
};

#[doc(inline)]
pub use principal::{Principal, preferred_user_name};

pub use audit::AuditLogger;
pub use discovery::{DiscoveryCache, DiscoveryConfig, DiscoveryDocument};
pub use jwt::{Claim, ClaimSet, ClaimValueKind, SignatureVerifier};
pub use validation::ClaimsValidator;
