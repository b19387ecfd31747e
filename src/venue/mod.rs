//! Venue module
//!
//! Uniform capability surface over brokerage accounts

mod paper;
mod types;

pub use paper::{PaperAccount, PaperOp, PaperVenue};
pub use types::{
    AccountContext, CancelOutcome, InstrumentSpec, OrderId, OrderRequest, PendingOrder,
    VenueError,
};

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for venue adapter implementations
///
/// Each implementation owns its own session and credential lifecycle; callers
/// never branch on the concrete venue.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue identifier
    fn venue_id(&self) -> &str;
    /// Whether the venue enforces order expiry itself
    fn supports_native_expiry(&self) -> bool;
    /// Fetch a fresh account snapshot
    async fn get_account_context(&self, account_id: &str) -> Result<AccountContext, VenueError>;
    /// List tradable instruments
    async fn list_instruments(&self, account_id: &str) -> Result<Vec<InstrumentSpec>, VenueError>;
    /// Current price of a venue-native symbol
    ///
    /// Callers map unified symbols through the instrument table first.
    async fn get_price(&self, account_id: &str, symbol: &str) -> Result<Decimal, VenueError>;
    /// Place a pending limit order
    async fn submit_limit_order(
        &self,
        account_id: &str,
        request: &OrderRequest,
    ) -> Result<PendingOrder, VenueError>;
    /// List pending orders
    async fn list_pending_orders(&self, account_id: &str) -> Result<Vec<PendingOrder>, VenueError>;
    /// Cancel a pending order
    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<CancelOutcome, VenueError>;
}

/// One configured account and the venue serving it
#[derive(Clone)]
pub struct AccountBinding {
    /// Account identifier
    pub account_id: String,
    /// Venue adapter
    pub venue: Arc<dyn VenueAdapter>,
    /// Disabled accounts are ignored by dispatch and sweeps
    pub enabled: bool,
    /// Whether the reconciler leaves native-expiry orders to the venue
    pub exempt_native_expiry: bool,
}

impl AccountBinding {
    /// Bind an enabled account to a venue
    pub fn new(account_id: impl Into<String>, venue: Arc<dyn VenueAdapter>) -> Self {
        Self {
            account_id: account_id.into(),
            venue,
            enabled: true,
            exempt_native_expiry: true,
        }
    }

    /// Set the enabled flag
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the native-expiry exemption flag
    pub fn exempt_native_expiry(mut self, exempt: bool) -> Self {
        self.exempt_native_expiry = exempt;
        self
    }

    /// Venue identifier
    pub fn venue_id(&self) -> &str {
        self.venue.venue_id()
    }
}

impl std::fmt::Debug for AccountBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountBinding")
            .field("account_id", &self.account_id)
            .field("venue", &self.venue.venue_id())
            .field("enabled", &self.enabled)
            .finish()
    }
}
