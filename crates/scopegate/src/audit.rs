//! Structured Audit Logging for Token Validation
//!
//! Every call to [`crate::TokenValidationEngine::validate`] produces exactly
//! one audit event on the `audit::token` tracing target, so a subscriber can
//! route them separately from operational logs.
//!
//! ## Event Types
//!
//! - [`TokenEvent::Accepted`] - token passed every check
//! - [`TokenEvent::Rejected`] - token refused, with the reason category and
//!   the detailed reason
//!
//! ## Privacy
//!
//! Raw tokens are never logged. Subjects can be replaced by a truncated
//! BLAKE3 digest with [`AuditLogger::privacy_focused`]. The detailed rejection
//! reason is logged here and nowhere else; callers only ever see
//! [`Rejection::kind`](crate::Rejection::kind).
//!
//! ## Usage
//!
//! ```rust
//! use scopegate::audit::{AuditLogger, TokenEvent};
//!
//! let logger = AuditLogger::privacy_focused("orders-api");
//!
//! let record = logger.log(TokenEvent::Rejected {
//!     category: "signature".to_string(),
//!     status: "unauthenticated".to_string(),
//!     reason: "token header has no key id".to_string(),
//! });
//! assert_eq!(record.service, "orders-api");
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Rejection, RejectionKind};
use crate::principal::Principal;

/// Tracing target for audit events
pub const AUDIT_TARGET: &str = "audit::token";

/// Audit logger for token validation events
#[derive(Debug, Clone)]
pub struct AuditLogger {
    /// Service name for event attribution
    service_name: String,
    /// Whether to hash subjects
    hash_identifiers: bool,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new("scopegate")
    }
}

impl AuditLogger {
    /// Create a new audit logger with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: false,
        }
    }

    /// Create a logger that hashes subjects
    pub fn privacy_focused(service_name: impl Into<String>) -> Self {
        Self::new(service_name).with_identifier_hashing(true)
    }

    /// Builder method to configure identifier hashing
    pub fn with_identifier_hashing(mut self, hash: bool) -> Self {
        self.hash_identifiers = hash;
        self
    }

    /// Service name attached to every record
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Record an accepted token
    pub fn record_accepted(&self, principal: &Principal) -> AuditRecord {
        self.log(TokenEvent::Accepted {
            subject: principal.subject().map(|s| self.maybe_hash(s)),
            scope: principal.scope().map(str::to_string),
        })
    }

    /// Record a rejected token
    pub fn record_rejected(&self, rejection: &Rejection) -> AuditRecord {
        self.log(TokenEvent::from(rejection))
    }

    /// Emit an event and return the record that was logged
    ///
    /// Subjects inside `event` are logged as given; use
    /// [`record_accepted`](Self::record_accepted) to get hashing applied.
    pub fn log(&self, event: TokenEvent) -> AuditRecord {
        let record = AuditRecord {
            id: Uuid::now_v7(),
            timestamp: unix_seconds(SystemTime::now()),
            service: self.service_name.clone(),
            event,
        };

        match &record.event {
            TokenEvent::Accepted { subject, scope } => {
                info!(
                    target: AUDIT_TARGET,
                    audit_id = %record.id,
                    event_type = "token_accepted",
                    subject = ?subject,
                    scope = ?scope,
                    service = %self.service_name,
                    "Token accepted"
                );
            }
            TokenEvent::Rejected {
                category,
                status,
                reason,
            } => match category.as_str() {
                "malformed_header" => debug!(
                    target: AUDIT_TARGET,
                    audit_id = %record.id,
                    event_type = "token_rejected",
                    category = %category,
                    status = %status,
                    reason = %reason,
                    service = %self.service_name,
                    "Token rejected"
                ),
                "discovery" => error!(
                    target: AUDIT_TARGET,
                    audit_id = %record.id,
                    event_type = "token_rejected",
                    category = %category,
                    status = %status,
                    reason = %reason,
                    service = %self.service_name,
                    "Token rejected"
                ),
                "scope" => info!(
                    target: AUDIT_TARGET,
                    audit_id = %record.id,
                    event_type = "token_rejected",
                    category = %category,
                    status = %status,
                    reason = %reason,
                    service = %self.service_name,
                    "Token rejected"
                ),
                _ => warn!(
                    target: AUDIT_TARGET,
                    audit_id = %record.id,
                    event_type = "token_rejected",
                    category = %category,
                    status = %status,
                    reason = %reason,
                    service = %self.service_name,
                    "Token rejected"
                ),
            },
        }

        record
    }

    fn maybe_hash(&self, value: &str) -> String {
        if self.hash_identifiers {
            let hash = blake3::hash(value.as_bytes());
            format!("blake3:{}", &hash.to_hex()[..16])
        } else {
            value.to_string()
        }
    }
}

/// Token validation events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    /// Token passed every check
    Accepted {
        /// `sub` claim, hashed when the logger is privacy focused
        subject: Option<String>,
        /// Granted scope value
        scope: Option<String>,
    },

    /// Token refused
    Rejected {
        /// [`RejectionReason::category`](crate::RejectionReason::category) of the failure
        category: String,
        /// `unauthenticated` or `forbidden`
        status: String,
        /// Detailed [`RejectionReason`](crate::RejectionReason), for operators only
        reason: String,
    },
}

/// Audit record as emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Time-ordered unique id
    pub id: Uuid,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Emitting service
    pub service: String,
    /// The event
    pub event: TokenEvent,
}

impl From<&Rejection> for TokenEvent {
    fn from(rejection: &Rejection) -> Self {
        let status = match rejection.kind() {
            RejectionKind::Unauthenticated => "unauthenticated",
            RejectionKind::Forbidden => "forbidden",
        };
        TokenEvent::Rejected {
            category: rejection.reason().category().to_string(),
            status: status.to_string(),
            reason: rejection.reason().to_string(),
        }
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
