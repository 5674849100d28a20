//! Authenticated caller identity
//!
//! A [`Principal`] is only ever constructed from a token that passed every
//! check, so holding one is proof of authorization for the configured scope.

use crate::jwt::ClaimSet;
use crate::jwt::claim_types::{PREFERRED_USERNAME, SCOPE_TYPES, SUBJECT};

/// The identity extracted from an accepted token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    claims: ClaimSet,
}

impl Principal {
    pub(crate) fn new(claims: ClaimSet) -> Self {
        Self { claims }
    }

    /// All verified claims, in token order
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// First value of a claim type
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims.find_first(claim_type)
    }

    /// All values of a claim type
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims.find_all(claim_type)
    }

    /// `sub` claim
    pub fn subject(&self) -> Option<&str> {
        self.find_first(SUBJECT)
    }

    /// `preferred_username` claim
    pub fn preferred_username(&self) -> Option<&str> {
        self.find_first(PREFERRED_USERNAME)
    }

    /// Raw value of the scope claim that was checked
    pub fn scope(&self) -> Option<&str> {
        self.claims
            .find_first_of(&SCOPE_TYPES)
            .map(|claim| claim.value.as_str())
    }

    /// Scope value split on whitespace
    pub fn scopes(&self) -> Vec<&str> {
        self.scope()
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Consume the principal and return its claims
    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }
}

/// Display name for an authenticated caller
///
/// Returns the `preferred_username` claim, or an empty string if absent.
///
/// ```rust,ignore
/// let name = scopegate::preferred_user_name(&principal);
/// tracing::info!(user = %name, "Order created");
/// ```
pub fn preferred_user_name(principal: &Principal) -> String {
    principal
        .preferred_username()
        .unwrap_or_default()
        .to_string()
}
