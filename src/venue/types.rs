//! Venue types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::MarketCalendarProfile;
use crate::signal::Side;

/// Venue-assigned order identifier
pub type OrderId = String;

/// Venue errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VenueError {
    /// Transport failure, transient
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    /// Expired or invalid credentials
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Venue declined the order
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Venue-provided reason text
        reason: String,
    },
    /// Unknown account or object
    #[error("Not found: {0}")]
    NotFound(String),
}

impl VenueError {
    /// Whether retrying the whole signal later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, VenueError::Connectivity(_))
    }
}

/// Account snapshot fetched before filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountContext {
    /// Venue identifier
    pub venue_id: String,
    /// Account identifier
    pub account_id: String,
    /// Account equity
    pub equity: Decimal,
    /// Account balance
    pub balance: Decimal,
    /// Margin in use
    pub used_margin: Decimal,
    /// Free margin
    pub free_margin: Decimal,
    /// Daily drawdown consumed, percent
    pub daily_drawdown_pct: Decimal,
    /// Open positions
    pub open_positions: usize,
    /// Pending orders
    pub pending_orders: usize,
    /// Unified symbols with a pending order
    #[serde(default)]
    pub pending_symbols: HashSet<String>,
}

impl AccountContext {
    /// Free margin as a percentage of equity, `None` when equity is not positive
    pub fn free_margin_pct(&self) -> Option<Decimal> {
        if self.equity <= Decimal::ZERO {
            return None;
        }
        Some(self.free_margin / self.equity * dec!(100))
    }

    /// Whether a pending order already exists on `symbol`
    pub fn has_pending_on(&self, symbol: &str) -> bool {
        self.pending_symbols.contains(symbol)
    }
}

/// Tradable instrument on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Unified symbol
    pub symbol: String,
    /// Venue-native symbol
    pub venue_symbol: String,
    /// Price increment of one pip
    pub pip_size: Decimal,
    /// Fixed pip value per lot in account currency
    #[serde(default)]
    pub pip_value_per_lot: Option<Decimal>,
    /// Quote currency
    #[serde(default)]
    pub quote_currency: Option<String>,
    /// Smallest order size
    pub min_lot: Decimal,
    /// Largest order size
    pub max_lot: Decimal,
    /// Order size increment
    pub lot_step: Decimal,
    /// Units per lot
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,
    /// Pair whose price converts quote currency to USD
    #[serde(default)]
    pub conversion_symbol: Option<String>,
}

fn default_contract_size() -> Decimal {
    dec!(100000)
}

impl InstrumentSpec {
    /// Forex-style spec with the standard contract size
    pub fn new(symbol: impl Into<String>, pip_size: Decimal) -> Self {
        let symbol = symbol.into();
        Self {
            venue_symbol: symbol.clone(),
            symbol,
            pip_size,
            pip_value_per_lot: None,
            quote_currency: None,
            min_lot: dec!(0.01),
            max_lot: dec!(100),
            lot_step: dec!(0.01),
            contract_size: default_contract_size(),
            conversion_symbol: None,
        }
    }

    /// Set the venue-native symbol
    pub fn with_venue_symbol(mut self, venue_symbol: impl Into<String>) -> Self {
        self.venue_symbol = venue_symbol.into();
        self
    }

    /// Set a fixed pip value
    pub fn with_pip_value(mut self, pip_value_per_lot: Decimal) -> Self {
        self.pip_value_per_lot = Some(pip_value_per_lot);
        self
    }

    /// Set the quote currency
    pub fn with_quote_currency(mut self, quote: impl Into<String>) -> Self {
        self.quote_currency = Some(quote.into().to_ascii_uppercase());
        self
    }

    /// Set lot bounds
    pub fn with_lots(mut self, min_lot: Decimal, max_lot: Decimal, lot_step: Decimal) -> Self {
        self.min_lot = min_lot;
        self.max_lot = max_lot;
        self.lot_step = lot_step;
        self
    }

    /// Whether the quote currency is USD (or unknown)
    pub fn is_usd_quoted(&self) -> bool {
        self.quote_currency
            .as_deref()
            .map_or(true, |q| q.eq_ignore_ascii_case("USD"))
    }

    /// Pair the caller must price to resolve pip value, if any
    pub fn conversion_pair(&self) -> Option<String> {
        if self.pip_value_per_lot.is_some() || self.is_usd_quoted() {
            return None;
        }
        self.conversion_symbol
            .clone()
            .or_else(|| self.quote_currency.as_ref().map(|q| format!("USD{q}")))
    }

    /// Express a conversion pair price as USD/QUOTE
    ///
    /// Pairs quoted the other way round (e.g. GBPUSD for a GBP quote) are inverted.
    pub fn usd_quote_rate(&self, pair_price: Decimal) -> Decimal {
        let inverted = match (self.conversion_pair(), self.quote_currency.as_deref()) {
            (Some(pair), Some(quote)) => pair.starts_with(quote) && pair.ends_with("USD"),
            _ => false,
        };
        if inverted && !pair_price.is_zero() {
            Decimal::ONE / pair_price
        } else {
            pair_price
        }
    }
}

/// Limit order handed to a venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Unified symbol
    pub symbol: String,
    /// Venue-native symbol
    pub venue_symbol: String,
    /// Direction
    pub side: Side,
    /// Limit price
    pub entry: Decimal,
    /// Stop-loss price
    pub stop: Decimal,
    /// Take-profit price
    pub target: Option<Decimal>,
    /// Order size in lots
    pub lots: Decimal,
    /// Validity in bars
    pub validity_bars: u32,
    /// Venue-enforced expiry instant
    pub expires_at: Option<DateTime<Utc>>,
    /// Short order label
    pub label: String,
    /// Free-text comment
    pub comment: String,
}

/// A pending order as reported by a venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Venue order id
    pub order_id: OrderId,
    /// Owning account
    pub account_id: String,
    /// Unified symbol
    pub symbol: String,
    /// Direction
    pub side: Side,
    /// Venue-reported creation instant
    pub created_at: DateTime<Utc>,
    /// Validity in bars, when the venue kept it
    #[serde(default)]
    pub validity_bars: Option<u32>,
    /// Calendar profile, when known
    #[serde(default)]
    pub profile: Option<MarketCalendarProfile>,
    /// Limit price
    pub entry: Decimal,
    /// Stop-loss price
    pub stop: Decimal,
    /// Take-profit price
    #[serde(default)]
    pub target: Option<Decimal>,
    /// Size in lots
    pub lots: Decimal,
    /// Venue-enforced expiry instant
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a cancel call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Order was cancelled by this call
    Cancelled,
    /// Order no longer exists venue-side
    NotFound,
}
