//! JWT Infrastructure - claim sets and signature verification
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────┐
//! │ SignatureVerifier        │     │ ClaimSet             │
//! │  - header / alg checks   │ ──▶ │  ordered (type,value)│
//! │  - kid → JWK lookup      │     │  pairs, repeatable   │
//! │  - JWS signature check   │     └──────────────────────┘
//! └──────────────────────────┘
//! ```
//!
//! The verifier only answers "was this signed by a published key?". Issuer,
//! audience, lifetime and scope are enforced afterwards by
//! [`crate::validation::ClaimsValidator`], in a fixed order.

pub mod verifier;

pub use verifier::{SignatureVerifier, VerifiedToken};

use serde_json::{Map, Value};

/// Registered and well-known claim types
pub mod claim_types {
    /// Issuer
    pub const ISSUER: &str = "iss";
    /// Audience
    pub const AUDIENCE: &str = "aud";
    /// Expiration time
    pub const EXPIRES: &str = "exp";
    /// Not before
    pub const NOT_BEFORE: &str = "nbf";
    /// Issued at
    pub const ISSUED_AT: &str = "iat";
    /// Subject
    pub const SUBJECT: &str = "sub";
    /// Human readable account name
    pub const PREFERRED_USERNAME: &str = "preferred_username";
    /// Delegated permission claim used by Microsoft identity platform v2 tokens
    pub const SCP: &str = "scp";
    /// Long-form scope claim type used by WS-Federation style claim mapping
    pub const SCOPE_URI: &str = "http://schemas.microsoft.com/identity/claims/scope";
    /// RFC 8693 scope claim
    pub const SCOPE: &str = "scope";

    /// Claim types that carry granted scopes, in lookup priority
    pub const SCOPE_TYPES: [&str; 3] = [SCP, SCOPE_URI, SCOPE];
}

/// JSON type a claim value was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimValueKind {
    /// JSON string, kept verbatim
    #[default]
    String,
    /// JSON number, kept as its JSON text
    Number,
    /// JSON boolean
    Boolean,
    /// Nested object or array, kept as compact JSON
    Json,
}

/// A single typed claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Claim type, e.g. `iss` or `scp`
    pub claim_type: String,
    /// Claim value rendered as a string
    pub value: String,
    /// JSON type of the original value
    pub kind: ClaimValueKind,
}

impl Claim {
    /// Create a string-valued claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_kind(claim_type, value, ClaimValueKind::String)
    }

    /// Create a claim whose value came from a JSON number
    pub fn number(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_kind(claim_type, value, ClaimValueKind::Number)
    }

    /// Create a claim with an explicit value kind
    pub fn with_kind(
        claim_type: impl Into<String>,
        value: impl Into<String>,
        kind: ClaimValueKind,
    ) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            kind,
        }
    }
}

/// Ordered claim sequence; a claim type may appear more than once
///
/// Built from a verified JSON payload: array values expand to one claim per
/// element, scalars keep their JSON text, nested objects are kept as compact
/// JSON and `null` values are dropped. Each claim remembers its JSON type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    /// Create an empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claim
    pub fn push(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// First claim of the given type
    pub fn first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.claim_type == claim_type)
    }

    /// First value of the given claim type
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.first(claim_type).map(|claim| claim.value.as_str())
    }

    /// All values of the given claim type, in token order
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |claim| claim.claim_type == claim_type)
            .map(|claim| claim.value.as_str())
    }

    /// First claim whose type is any of `claim_types`
    pub fn find_first_of(&self, claim_types: &[&str]) -> Option<&Claim> {
        self.claims
            .iter()
            .find(|claim| claim_types.contains(&claim.claim_type.as_str()))
    }

    /// Iterate over all claims
    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.claims.iter()
    }

    /// Number of claims
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Build a claim set from a JSON object payload
    pub fn from_json_object(payload: &Map<String, Value>) -> Self {
        let mut set = Self::new();
        for (claim_type, value) in payload {
            match value {
                Value::Array(items) => {
                    for item in items {
                        set.push_value(claim_type, item);
                    }
                }
                other => set.push_value(claim_type, other),
            }
        }
        set
    }

    fn push_value(&mut self, claim_type: &str, value: &Value) {
        let (rendered, kind) = match value {
            Value::Null => return,
            Value::String(text) => (text.clone(), ClaimValueKind::String),
            Value::Number(_) => (value.to_string(), ClaimValueKind::Number),
            Value::Bool(_) => (value.to_string(), ClaimValueKind::Boolean),
            Value::Array(_) | Value::Object(_) => (value.to_string(), ClaimValueKind::Json),
        };
        self.push(Claim::with_kind(claim_type, rendered, kind));
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self {
            claims: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.iter()
    }
}
