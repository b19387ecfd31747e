//! Reconciliation types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::venue::OrderId;

/// Reconciler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcilerConfig {
    /// Seconds between sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Leave orders on native-expiry venues to the venue
    #[serde(default = "default_true")]
    pub exempt_native_expiry: bool,
}

fn default_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl ReconcilerConfig {
    /// Sweep interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            exempt_native_expiry: true,
        }
    }
}

/// What the sweep did with one pending order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    /// Cancelled by this sweep
    Cancelled {
        /// Counted bars elapsed
        elapsed: u32,
        /// Validity in bars
        validity: u32,
    },
    /// Expired, left in place because the sweep was a dry run
    Expired {
        /// Counted bars elapsed
        elapsed: u32,
        /// Validity in bars
        validity: u32,
    },
    /// Expired but already gone venue-side
    AlreadyGone,
    /// Expired but the cancel call failed
    CancelFailed {
        /// Venue error text
        error: String,
    },
    /// Still within its validity window
    StillPending {
        /// Counted bars elapsed
        elapsed: u32,
        /// Validity in bars
        validity: u32,
        /// Instant at which it expires
        expires_at: DateTime<Utc>,
    },
}

/// Disposition of one order
#[derive(Debug, Clone, Serialize)]
pub struct OrderDisposition {
    /// Venue order id
    pub order_id: OrderId,
    /// Unified symbol
    pub symbol: String,
    /// Venue-reported creation instant
    pub created_at: DateTime<Utc>,
    /// Outcome
    pub disposition: Disposition,
}

/// How an account was handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccountStatus {
    /// Pending orders listed and reconciled
    Swept,
    /// Venue enforces expiry itself
    Exempt,
    /// Listing pending orders failed
    ListFailed {
        /// Venue error text
        error: String,
    },
}

/// Sweep outcome for one account
#[derive(Debug, Clone, Serialize)]
pub struct AccountSweep {
    /// Account identifier
    pub account_id: String,
    /// Venue identifier
    pub venue_id: String,
    /// Account-level status
    pub status: AccountStatus,
    /// Per-order dispositions
    pub orders: Vec<OrderDisposition>,
}

/// Result of one sweep over every enabled account
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Instant bar counts were computed against
    pub swept_at: DateTime<Utc>,
    /// Wall time of the sweep
    pub elapsed: Duration,
    /// No cancels were issued
    pub dry_run: bool,
    /// Per-account results, in configured order
    pub accounts: Vec<AccountSweep>,
}

impl SweepReport {
    /// Orders cancelled
    pub fn cancelled_count(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Cancelled { .. }))
    }

    /// Expired orders a dry run left in place
    pub fn expired_count(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Expired { .. }))
    }

    /// Expired orders that were already gone
    pub fn already_gone_count(&self) -> usize {
        self.count(|d| matches!(d, Disposition::AlreadyGone))
    }

    /// Cancel calls that failed
    pub fn cancel_failed_count(&self) -> usize {
        self.count(|d| matches!(d, Disposition::CancelFailed { .. }))
    }

    /// Orders left pending
    pub fn still_pending_count(&self) -> usize {
        self.count(|d| matches!(d, Disposition::StillPending { .. }))
    }

    /// Disposition of an order
    pub fn disposition(&self, order_id: &str) -> Option<&Disposition> {
        self.accounts
            .iter()
            .flat_map(|a| a.orders.iter())
            .find(|o| o.order_id == order_id)
            .map(|o| &o.disposition)
    }

    /// Sweep result for an account
    pub fn account(&self, account_id: &str) -> Option<&AccountSweep> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    fn count(&self, pred: impl Fn(&Disposition) -> bool) -> usize {
        self.accounts
            .iter()
            .flat_map(|a| a.orders.iter())
            .filter(|o| pred(&o.disposition))
            .count()
    }
}
