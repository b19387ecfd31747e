//! Pre-placement account filters

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::venue::{AccountContext, InstrumentSpec};

/// Filter thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterThresholds {
    /// Minimum free margin as percent of equity
    #[serde(default = "default_min_free_margin_pct")]
    pub min_free_margin_pct: Decimal,
    /// Maximum daily drawdown consumed, percent
    #[serde(default = "default_max_daily_drawdown_pct")]
    pub max_daily_drawdown_pct: Decimal,
    /// Maximum open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Maximum pending orders, unchecked when absent
    #[serde(default)]
    pub max_pending_orders: Option<usize>,
    /// Skip accounts with a pending order on the same instrument
    #[serde(default = "default_true")]
    pub prevent_duplicates: bool,
}

fn default_min_free_margin_pct() -> Decimal {
    dec!(50)
}
fn default_max_daily_drawdown_pct() -> Decimal {
    dec!(4)
}
fn default_max_open_positions() -> usize {
    5
}
fn default_true() -> bool {
    true
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            min_free_margin_pct: default_min_free_margin_pct(),
            max_daily_drawdown_pct: default_max_daily_drawdown_pct(),
            max_open_positions: default_max_open_positions(),
            max_pending_orders: None,
            prevent_duplicates: true,
        }
    }
}

/// Individual filter, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Instrument mapped on the account's venue
    InstrumentAvailable,
    /// Free margin
    Margin,
    /// Daily drawdown
    Drawdown,
    /// Open position count
    PositionCount,
    /// Pending order count
    PendingCount,
    /// Existing pending order on the instrument
    Duplicate,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::InstrumentAvailable => "instrument",
            FilterKind::Margin => "margin",
            FilterKind::Drawdown => "drawdown",
            FilterKind::PositionCount => "positions",
            FilterKind::PendingCount => "pending",
            FilterKind::Duplicate => "duplicate",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCheck {
    /// Filter evaluated
    pub kind: FilterKind,
    /// Whether it passed
    pub passed: bool,
    /// Human-readable reason
    pub reason: String,
}

impl FilterCheck {
    fn pass(kind: FilterKind, reason: String) -> Self {
        Self {
            kind,
            passed: true,
            reason,
        }
    }

    fn fail(kind: FilterKind, reason: String) -> Self {
        Self {
            kind,
            passed: false,
            reason,
        }
    }
}

/// All filter outcomes for one account
#[derive(Debug, Clone, Serialize)]
pub struct FilterVerdict {
    /// Account evaluated
    pub account_id: String,
    /// Every check, in evaluation order
    pub checks: Vec<FilterCheck>,
}

impl FilterVerdict {
    /// Allowed only when every filter passes
    pub fn is_allowed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Reasons of failing filters, in evaluation order
    pub fn reasons(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.kind, c.reason))
            .collect()
    }

    /// First failing reason
    pub fn first_reason(&self) -> Option<String> {
        self.reasons().into_iter().next()
    }

    /// Kinds of failing filters
    pub fn failed_kinds(&self) -> Vec<FilterKind> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.kind)
            .collect()
    }
}

/// Evaluates account filters against configured thresholds
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    thresholds: FilterThresholds,
}

impl FilterEngine {
    /// Create a new filter engine
    pub fn new(thresholds: FilterThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every filter for an account and symbol
    ///
    /// `spec` is `None` when the symbol has no mapping on the account's venue.
    pub fn evaluate(
        &self,
        ctx: &AccountContext,
        symbol: &str,
        spec: Option<&InstrumentSpec>,
    ) -> FilterVerdict {
        let mut checks = vec![
            self.check_instrument(ctx, symbol, spec),
            self.check_margin(ctx),
            self.check_drawdown(ctx),
            self.check_positions(ctx),
        ];
        if let Some(max) = self.thresholds.max_pending_orders {
            checks.push(Self::check_pending(ctx, max));
        }
        if self.thresholds.prevent_duplicates {
            checks.push(Self::check_duplicate(ctx, symbol));
        }

        FilterVerdict {
            account_id: ctx.account_id.clone(),
            checks,
        }
    }

    fn check_instrument(
        &self,
        ctx: &AccountContext,
        symbol: &str,
        spec: Option<&InstrumentSpec>,
    ) -> FilterCheck {
        match spec {
            Some(spec) => FilterCheck::pass(
                FilterKind::InstrumentAvailable,
                format!("{symbol} maps to {}", spec.venue_symbol),
            ),
            None => FilterCheck::fail(
                FilterKind::InstrumentAvailable,
                format!("{symbol} not available on {}", ctx.venue_id),
            ),
        }
    }

    fn check_margin(&self, ctx: &AccountContext) -> FilterCheck {
        let min = self.thresholds.min_free_margin_pct;
        match ctx.free_margin_pct() {
            None => FilterCheck::fail(
                FilterKind::Margin,
                format!("equity {} is not positive", ctx.equity),
            ),
            Some(pct) if pct < min => FilterCheck::fail(
                FilterKind::Margin,
                format!("free margin {:.1}% below {min}%", pct),
            ),
            Some(pct) => FilterCheck::pass(FilterKind::Margin, format!("free margin {:.1}%", pct)),
        }
    }

    fn check_drawdown(&self, ctx: &AccountContext) -> FilterCheck {
        let max = self.thresholds.max_daily_drawdown_pct;
        let used = ctx.daily_drawdown_pct;
        if used >= max {
            FilterCheck::fail(
                FilterKind::Drawdown,
                format!("daily drawdown {used}% reached limit {max}%"),
            )
        } else {
            FilterCheck::pass(FilterKind::Drawdown, format!("daily drawdown {used}%"))
        }
    }

    fn check_positions(&self, ctx: &AccountContext) -> FilterCheck {
        let max = self.thresholds.max_open_positions;
        if ctx.open_positions >= max {
            FilterCheck::fail(
                FilterKind::PositionCount,
                format!("{} open positions, limit {max}", ctx.open_positions),
            )
        } else {
            FilterCheck::pass(
                FilterKind::PositionCount,
                format!("{} open positions", ctx.open_positions),
            )
        }
    }

    fn check_pending(ctx: &AccountContext, max: usize) -> FilterCheck {
        if ctx.pending_orders >= max {
            FilterCheck::fail(
                FilterKind::PendingCount,
                format!("{} pending orders, limit {max}", ctx.pending_orders),
            )
        } else {
            FilterCheck::pass(
                FilterKind::PendingCount,
                format!("{} pending orders", ctx.pending_orders),
            )
        }
    }

    fn check_duplicate(ctx: &AccountContext, symbol: &str) -> FilterCheck {
        if ctx.has_pending_on(symbol) {
            FilterCheck::fail(
                FilterKind::Duplicate,
                format!("pending order already open on {symbol}"),
            )
        } else {
            FilterCheck::pass(FilterKind::Duplicate, format!("no pending order on {symbol}"))
        }
    }
}
