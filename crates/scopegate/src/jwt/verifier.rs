//! JWS signature verification against a published key set
//!
//! Verification order:
//! 1. Decode the header (unsigned `none` tokens and garbage fail here)
//! 2. Check the algorithm against the allow-list (asymmetric only)
//! 3. Require a key id and find the matching JWK
//! 4. If the JWK pins an algorithm, it must equal the header's
//! 5. Verify the signature
//! 6. Require a JSON object payload
//!
//! Time and audience claims are deliberately NOT checked here; see
//! [`crate::validation`]. Nothing from the payload is returned unless the
//! signature verified.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Header, TokenData, Validation, decode, decode_header};
use serde_json::Value;
use tracing::{debug, warn};

use super::ClaimSet;
use crate::error::SignatureError;

const DEFAULT_ALGORITHMS: [Algorithm; 3] = [Algorithm::ES256, Algorithm::RS256, Algorithm::PS256];

/// A token whose signature has been verified
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// Decoded JOSE header
    pub header: Header,
    /// Payload claims, in token order
    pub claims: ClaimSet,
}

/// Signature verifier with an algorithm allow-list
///
/// # Example
///
/// ```rust
/// use jsonwebtoken::Algorithm;
/// use jsonwebtoken::jwk::JwkSet;
/// use scopegate::jwt::SignatureVerifier;
///
/// let verifier = SignatureVerifier::new().with_algorithms(vec![Algorithm::RS256]);
/// let empty = JwkSet { keys: vec![] };
///
/// assert!(verifier.verify("not-a-token", &empty).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    /// Accepted `alg` header values (default: ES256, RS256, PS256)
    allowed_algorithms: Vec<Algorithm>,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier {
    /// Create a verifier accepting ES256, RS256 and PS256
    pub fn new() -> Self {
        Self {
            allowed_algorithms: DEFAULT_ALGORITHMS.to_vec(),
        }
    }

    /// Replace the allowed algorithms
    ///
    /// HMAC algorithms are dropped: a published key set holds public keys, and
    /// accepting HS* would let anyone holding that public material mint tokens.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms
            .into_iter()
            .filter(|alg| !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .collect();
        self
    }

    /// Allowed algorithms
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Verify `token` against `keys`
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] describing the first failed step.
    pub fn verify(&self, token: &str, keys: &JwkSet) -> Result<VerifiedToken, SignatureError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode JWT header");
            SignatureError::Malformed(e.to_string())
        })?;

        if !self.allowed_algorithms.contains(&header.alg) {
            warn!(
                algorithm = ?header.alg,
                allowed = ?self.allowed_algorithms,
                "JWT algorithm not allowed"
            );
            return Err(SignatureError::DisallowedAlgorithm(header.alg));
        }

        let kid = header.kid.clone().ok_or(SignatureError::MissingKeyId)?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| SignatureError::UnknownKeyId(kid.clone()))?;

        let decoding_key = decoding_key_for(jwk, &kid, header.alg)?;

        let mut validation = Validation::new(header.alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let token_data: TokenData<Value> =
            decode(token, &decoding_key, &validation).map_err(|e| {
                warn!(kid = %kid, error = %e, "JWT signature verification failed");
                SignatureError::InvalidSignature(e.to_string())
            })?;

        let claims = match token_data.claims {
            Value::Object(map) => ClaimSet::from_json_object(&map),
            other => {
                return Err(SignatureError::InvalidPayload(format!(
                    "expected object, found {}",
                    json_kind(&other)
                )));
            }
        };

        debug!(kid = %kid, algorithm = ?header.alg, claims = claims.len(), "JWT signature verified");

        Ok(VerifiedToken { header, claims })
    }
}

fn decoding_key_for(jwk: &Jwk, kid: &str, alg: Algorithm) -> Result<DecodingKey, SignatureError> {
    if let Some(pinned) = &jwk.common.key_algorithm {
        // Encryption algorithms (RSA-OAEP, ...) have no signing counterpart
        let pinned_alg = pinned.to_string().parse::<Algorithm>().ok();
        if pinned_alg != Some(alg) {
            warn!(kid = kid, key_alg = %pinned, token_alg = ?alg, "JWT algorithm does not match key");
            return Err(SignatureError::AlgorithmMismatch {
                kid: kid.to_string(),
                expected: pinned.to_string(),
                actual: alg,
            });
        }
    }

    DecodingKey::from_jwk(jwk).map_err(|e| SignatureError::InvalidKey {
        kid: kid.to_string(),
        reason: e.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
