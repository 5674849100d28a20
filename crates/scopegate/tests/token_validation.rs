//! End-to-end token validation against a mock identity provider
//!
//! Tests cover:
//! - Accepted tokens and the principal handed back
//! - Issuer, audience, lifetime and scope rejections
//! - Malformed authorization headers
//! - Clock skew tolerance
//! - Rejection detail reaching operator logs

mod common;

use std::time::Duration;

use common::{AUDIENCE, LogBuffer, MockIdentityProvider, PRIMARY_KEY, TENANT, bearer, epoch};
use scopegate::{
    ClaimValidationError, RejectionKind, RejectionReason, ScopeRejected, TokenValidationEngine,
    TrustConfig, ValidationOutcome, preferred_user_name,
};
use serde_json::json;

fn reason(outcome: &ValidationOutcome) -> RejectionReason {
    outcome
        .rejection()
        .expect("expected a rejection")
        .reason()
        .clone()
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    // GIVEN: a provider publishing the signing key
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    // WHEN: a correctly signed token with all claims is presented
    let token = PRIMARY_KEY.sign(&idp.claims());
    let outcome = engine.validate(&bearer(&token)).await;

    // THEN: the principal carries the token's claims
    let principal = outcome.into_result().expect("accepted");
    assert_eq!(preferred_user_name(&principal), "alice@contoso.com");
    assert_eq!(principal.subject(), Some("00000000-0000-0000-0000-0000000000a1"));
    assert_eq!(principal.scopes(), vec!["access_as_user"]);
    assert_eq!(principal.find_first("aud"), Some(AUDIENCE));
}

#[tokio::test]
async fn test_issuer_placeholder_is_substituted() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    engine.validate(&bearer(&PRIMARY_KEY.sign(&idp.claims()))).await;

    let document = engine.discovery().cached().await.expect("cached");
    assert_eq!(document.issuer, idp.issuer());
    assert!(document.issuer.contains(TENANT));
    assert!(!document.issuer.contains("{tenantid}"));
}

#[tokio::test]
async fn test_audience_mismatch_rejected() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("aud", json!("api://billing")));
    let outcome = engine.validate(&bearer(&token)).await;

    assert!(matches!(
        reason(&outcome),
        RejectionReason::Claims(ClaimValidationError::AudienceMismatch { .. })
    ));
    assert_eq!(
        outcome.rejection().unwrap().kind(),
        RejectionKind::Unauthenticated
    );
}

#[tokio::test]
async fn test_one_matching_audience_is_enough() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("aud", json!(["api://billing", AUDIENCE])));
    assert!(engine.validate(&bearer(&token)).await.is_accepted());
}

#[tokio::test]
async fn test_issuer_must_match_exactly() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let trailing_slash = format!("{}/", idp.issuer());
    let token = PRIMARY_KEY.sign(&idp.claims_with("iss", json!(trailing_slash)));
    let outcome = engine.validate(&bearer(&token)).await;

    assert!(matches!(
        reason(&outcome),
        RejectionReason::Claims(ClaimValidationError::IssuerMismatch { .. })
    ));

    let other_tenant = idp.issuer().replace(TENANT, "fabrikam");
    let token = PRIMARY_KEY.sign(&idp.claims_with("iss", json!(other_tenant)));
    assert!(!engine.validate(&bearer(&token)).await.is_accepted());
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(-120))));
    let outcome = engine.validate(&bearer(&token)).await;

    assert!(matches!(
        reason(&outcome),
        RejectionReason::Claims(ClaimValidationError::Expired { .. })
    ));
}

#[tokio::test]
async fn test_missing_expiry_rejected() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_without("exp"));
    assert_eq!(
        reason(&engine.validate(&bearer(&token)).await),
        RejectionReason::Claims(ClaimValidationError::MissingExpiry)
    );
}

#[tokio::test]
async fn test_not_yet_valid_rejected() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("nbf", json!(epoch(600))));
    assert!(matches!(
        reason(&engine.validate(&bearer(&token)).await),
        RejectionReason::Claims(ClaimValidationError::NotYetValid { .. })
    ));
}

#[tokio::test]
async fn test_clock_skew_accepts_recently_expired() {
    // GIVEN: an engine tolerating two minutes of skew
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let config = idp.trust_config().with_clock_skew(Duration::from_secs(120));
    let engine = TokenValidationEngine::new(config).unwrap();

    // THEN: a token expired 30 seconds ago passes, one expired 10 minutes ago fails
    let recent = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(-30))));
    assert!(engine.validate(&bearer(&recent)).await.is_accepted());

    let stale = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(-600))));
    assert!(!engine.validate(&bearer(&stale)).await.is_accepted());
}

#[tokio::test]
async fn test_scope_comparison_ignores_case() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("scp", json!("ACCESS_AS_USER")));
    assert!(engine.validate(&bearer(&token)).await.is_accepted());
}

#[tokio::test]
async fn test_wrong_scope_is_forbidden() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_with("scp", json!("access_as_admin")));
    let outcome = engine.validate(&bearer(&token)).await;

    assert_eq!(
        reason(&outcome),
        RejectionReason::Scope(ScopeRejected {
            required: "access_as_user".to_string(),
            found: Some("access_as_admin".to_string()),
        })
    );
    assert_eq!(outcome.rejection().unwrap().kind(), RejectionKind::Forbidden);
}

#[tokio::test]
async fn test_missing_scope_is_forbidden() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_without("scp"));
    let outcome = engine.validate(&bearer(&token)).await;
    assert_eq!(outcome.rejection().unwrap().kind(), RejectionKind::Forbidden);
}

#[tokio::test]
async fn test_long_form_scope_claim_accepted() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let mut claims = idp.claims_without("scp");
    claims["http://schemas.microsoft.com/identity/claims/scope"] = json!("access_as_user");
    assert!(engine.validate(&bearer(&PRIMARY_KEY.sign(&claims))).await.is_accepted());
}

#[tokio::test]
async fn test_configured_scope_is_enforced() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let config = idp.trust_config().with_required_scope("orders.read").unwrap();
    let engine = TokenValidationEngine::new(config).unwrap();

    let default_scope = PRIMARY_KEY.sign(&idp.claims());
    assert!(!engine.validate(&bearer(&default_scope)).await.is_accepted());

    let orders = PRIMARY_KEY.sign(&idp.claims_with("scp", json!("Orders.Read")));
    assert!(engine.validate(&bearer(&orders)).await.is_accepted());
}

#[tokio::test]
async fn test_missing_preferred_username_is_empty() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let token = PRIMARY_KEY.sign(&idp.claims_without("preferred_username"));
    let principal = engine.validate(&bearer(&token)).await.into_result().unwrap();
    assert_eq!(preferred_user_name(&principal), "");
}

#[tokio::test]
async fn test_malformed_headers_make_no_requests() {
    // GIVEN: a provider that would answer discovery
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();
    let token = PRIMARY_KEY.sign(&idp.claims());

    // WHEN: headers with the wrong or missing scheme are presented
    let headers = [
        String::new(),
        "Bearer ".to_string(),
        "Bearer".to_string(),
        format!("bearer {token}"),
        format!("BEARER {token}"),
        format!("Basic {token}"),
        token.clone(),
    ];
    for header in &headers {
        let outcome = engine.validate(header).await;
        assert_eq!(reason(&outcome), RejectionReason::MalformedHeader, "{header:?}");
    }

    // THEN: the identity provider was never contacted
    assert_eq!(idp.total_hits().await, 0);
}

#[tokio::test]
async fn test_configuration_requires_all_identifiers() {
    assert!(TrustConfig::new("https://login.example.com/", TENANT, AUDIENCE).is_ok());
    assert!(TrustConfig::new("", TENANT, AUDIENCE).is_err());
    assert!(TrustConfig::new("https://login.example.com/", "", AUDIENCE).is_err());
    assert!(TrustConfig::new("https://login.example.com/", TENANT, "").is_err());
}

#[tokio::test]
async fn test_rejection_display_is_uniform() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    let expired = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(-120))));
    let wrong_aud = PRIMARY_KEY.sign(&idp.claims_with("aud", json!("api://secret")));

    for header in ["garbage".to_string(), bearer(&expired), bearer(&wrong_aud)] {
        let rejection = engine.validate(&header).await.into_result().unwrap_err();
        assert_eq!(rejection.to_string(), "request is not authorized");
    }
}

#[tokio::test]
async fn test_string_expiry_rejected() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();

    // A numeric string is not a NumericDate
    let token = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(3600).to_string())));
    let outcome = engine.validate(&bearer(&token)).await;

    assert!(matches!(
        reason(&outcome),
        RejectionReason::Claims(ClaimValidationError::InvalidTimestamp { .. })
    ));
}

#[tokio::test]
async fn test_rejection_reasons_are_logged() {
    let idp = MockIdentityProvider::with_keys(&[&PRIMARY_KEY]).await;
    let engine = idp.engine();
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let wrong_audience = PRIMARY_KEY.sign(&idp.claims_with("aud", json!("api://billing")));
    let expired = PRIMARY_KEY.sign(&idp.claims_with("exp", json!(epoch(-3600))));
    let audience_outcome = engine.validate(&bearer(&wrong_audience)).await;
    let expired_outcome = engine.validate(&bearer(&expired)).await;

    // Callers see the same message for both
    assert_eq!(
        audience_outcome.rejection().unwrap().to_string(),
        expired_outcome.rejection().unwrap().to_string()
    );

    // Operators can tell them apart
    let output = logs.contents();
    let rejected: Vec<&str> = output
        .lines()
        .filter(|line| line.contains("audit::token") && line.contains("category=claims"))
        .collect();
    assert_eq!(rejected.len(), 2, "{output}");
    assert!(rejected[0].contains("api://billing"), "{output}");
    assert!(rejected[1].contains("expired"), "{output}");
}
