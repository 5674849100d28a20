//! Claims-based authorization
//!
//! Runs on a claim set whose signature has already been verified. Checks are
//! applied in a fixed order and the first failure wins:
//!
//! 1. Issuer - exact, case-sensitive match with the discovered issuer
//! 2. Audience - some `aud` value equals the configured audience
//! 3. Lifetime - `exp` required, `nbf` honoured, configured clock skew applied;
//!    both must be JSON numbers
//! 4. Scope - the scope claim equals the required scope, ignoring ASCII case
//!
//! Failures 1-3 mean the token is not trustworthy for this API; failure 4
//! means the caller is authenticated but not authorized.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;

use crate::config::TrustConfig;
use crate::error::{ClaimValidationError, RejectionReason, ScopeRejected};
use crate::jwt::{Claim, ClaimSet, ClaimValueKind};
use crate::jwt::claim_types::{AUDIENCE, EXPIRES, ISSUER, NOT_BEFORE, SCOPE_TYPES};

/// Outcome of a failed claims check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsFailure {
    /// Issuer, audience or lifetime check failed
    #[error(transparent)]
    Claims(#[from] ClaimValidationError),
    /// Scope check failed
    #[error(transparent)]
    Scope(#[from] ScopeRejected),
}

impl From<ClaimsFailure> for RejectionReason {
    fn from(failure: ClaimsFailure) -> Self {
        match failure {
            ClaimsFailure::Claims(err) => RejectionReason::Claims(err),
            ClaimsFailure::Scope(err) => RejectionReason::Scope(err),
        }
    }
}

/// Validates verified claims against a [`TrustConfig`]
#[derive(Debug, Clone)]
pub struct ClaimsValidator {
    audience: String,
    required_scope: String,
    clock_skew: Duration,
}

impl ClaimsValidator {
    /// Create a validator for the given configuration
    pub fn new(config: &TrustConfig) -> Self {
        Self {
            audience: config.audience().to_string(),
            required_scope: config.required_scope().to_string(),
            clock_skew: config.clock_skew(),
        }
    }

    /// Run all checks in order
    ///
    /// `expected_issuer` is the issuer published by the identity provider for
    /// this request; `now` is the instant the lifetime is checked against.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`ClaimsFailure`].
    pub fn validate(
        &self,
        claims: &ClaimSet,
        expected_issuer: &str,
        now: SystemTime,
    ) -> Result<(), ClaimsFailure> {
        self.check_issuer(claims, expected_issuer)?;
        self.check_audience(claims)?;
        self.check_lifetime(claims, now)?;
        self.check_scope(claims)?;
        Ok(())
    }

    /// Issuer check (exact string equality, no normalization)
    pub fn check_issuer(
        &self,
        claims: &ClaimSet,
        expected_issuer: &str,
    ) -> Result<(), ClaimValidationError> {
        let actual = claims
            .find_first(ISSUER)
            .ok_or(ClaimValidationError::MissingIssuer)?;

        if actual != expected_issuer {
            return Err(ClaimValidationError::IssuerMismatch {
                expected: expected_issuer.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Audience check
    pub fn check_audience(&self, claims: &ClaimSet) -> Result<(), ClaimValidationError> {
        let audiences: Vec<&str> = claims.find_all(AUDIENCE).collect();
        if audiences.is_empty() {
            return Err(ClaimValidationError::MissingAudience);
        }

        if !audiences.contains(&self.audience.as_str()) {
            return Err(ClaimValidationError::AudienceMismatch {
                expected: self.audience.clone(),
                actual: audiences.into_iter().map(str::to_string).collect(),
            });
        }
        Ok(())
    }

    /// Lifetime check: `nbf - skew <= now <= exp + skew`
    pub fn check_lifetime(
        &self,
        claims: &ClaimSet,
        now: SystemTime,
    ) -> Result<(), ClaimValidationError> {
        let now = unix_seconds(now);
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);

        let exp = claims
            .first(EXPIRES)
            .ok_or(ClaimValidationError::MissingExpiry)?;
        let exp = numeric_date(EXPIRES, exp)?;
        if now > exp.saturating_add(skew) {
            return Err(ClaimValidationError::Expired { expired_at: exp });
        }

        if let Some(nbf) = claims.first(NOT_BEFORE) {
            let nbf = numeric_date(NOT_BEFORE, nbf)?;
            if now.saturating_add(skew) < nbf {
                return Err(ClaimValidationError::NotYetValid { not_before: nbf });
            }
        }
        Ok(())
    }

    /// Scope check (whole value, ASCII case-insensitive)
    pub fn check_scope(&self, claims: &ClaimSet) -> Result<(), ScopeRejected> {
        let found = claims.find_first_of(&SCOPE_TYPES).map(|claim| claim.value.as_str());

        match found {
            Some(value) if value.eq_ignore_ascii_case(&self.required_scope) => Ok(()),
            other => {
                debug!(
                    required = %self.required_scope,
                    found = ?other,
                    "Required scope not granted"
                );
                Err(ScopeRejected {
                    required: self.required_scope.clone(),
                    found: other.map(str::to_string),
                })
            }
        }
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

/// Parse a NumericDate; it must be a JSON number, fractional seconds are truncated
fn numeric_date(name: &'static str, claim: &Claim) -> Result<i64, ClaimValidationError> {
    let invalid = || ClaimValidationError::InvalidTimestamp {
        claim: name,
        value: claim.value.clone(),
    };

    if claim.kind != ClaimValueKind::Number {
        return Err(invalid());
    }

    if let Ok(seconds) = claim.value.parse::<i64>() {
        return Ok(seconds);
    }

    match claim.value.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => Ok(seconds.trunc() as i64),
        _ => Err(invalid()),
    }
}
