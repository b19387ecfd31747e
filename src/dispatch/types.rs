//! Dispatch types

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::risk::SizingError;
use crate::venue::{OrderId, VenueError};

/// Per-account dispatch errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Venue call failed
    #[error(transparent)]
    Venue(#[from] VenueError),
    /// Inputs could not be sized
    #[error(transparent)]
    Sizing(#[from] SizingError),
    /// Account task panicked or was cancelled
    #[error("Account task aborted: {0}")]
    Task(String),
}

/// What happened for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccountOutcome {
    /// Order placed
    Submitted {
        /// Venue order id
        order_id: OrderId,
        /// Size in lots
        lots: Decimal,
    },
    /// Denied by filters
    Skipped {
        /// Failing filter reasons, in evaluation order
        reasons: Vec<String>,
    },
    /// Venue or sizing failure
    Failed {
        /// Error description
        #[serde(serialize_with = "serialize_error")]
        error: DispatchError,
    },
}

fn serialize_error<S: serde::Serializer>(error: &DispatchError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

impl AccountOutcome {
    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            AccountOutcome::Submitted { .. } => "submitted",
            AccountOutcome::Skipped { .. } => "skipped",
            AccountOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether an order was placed
    pub fn is_submitted(&self) -> bool {
        matches!(self, AccountOutcome::Submitted { .. })
    }
}

/// Outcome and timing for one account
#[derive(Debug, Clone, Serialize)]
pub struct AccountResult {
    /// Account identifier
    pub account_id: String,
    /// Venue identifier
    pub venue_id: String,
    /// Outcome
    pub outcome: AccountOutcome,
    /// Time from dispatch start to outcome
    pub elapsed: Duration,
}

/// Outcomes of one signal across every enabled account, in configured order
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Signal identifier
    pub signal_id: Uuid,
    /// Unified symbol
    pub symbol: String,
    /// Dispatch start
    pub started_at: DateTime<Utc>,
    /// Total wall time
    pub elapsed: Duration,
    /// Per-account results
    pub results: Vec<AccountResult>,
}

impl DispatchReport {
    /// Accounts with a submitted order
    pub fn submitted_count(&self) -> usize {
        self.count(|o| matches!(o, AccountOutcome::Submitted { .. }))
    }

    /// Accounts skipped by filters
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, AccountOutcome::Skipped { .. }))
    }

    /// Accounts that failed
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, AccountOutcome::Failed { .. }))
    }

    /// Outcome for an account
    pub fn outcome(&self, account_id: &str) -> Option<&AccountOutcome> {
        self.results
            .iter()
            .find(|r| r.account_id == account_id)
            .map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&AccountOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}
