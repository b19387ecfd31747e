//! Risk management types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position sizing errors
///
/// Sizing errors describe unusable inputs and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SizingError {
    /// Entry equals stop
    #[error("Stop distance is zero")]
    ZeroStopDistance,
    /// Pip value resolved to zero or below
    #[error("Pip value per lot is not positive: {0}")]
    NonPositivePipValue(Decimal),
    /// No conversion rate and no reference value for the quote currency
    #[error("Missing conversion rate for quote currency {0}")]
    MissingConversionRate(String),
    /// Risk fraction outside (0, 1]
    #[error("Risk fraction must be in (0, 1]: {0}")]
    InvalidRiskFraction(Decimal),
    /// Equity or balance not positive
    #[error("Sizing basis is not positive: {0}")]
    NonPositiveBasis(Decimal),
    /// Inconsistent lot bounds
    #[error("Invalid lot bounds: min {min}, max {max}, step {step}")]
    InvalidLotBounds {
        /// Minimum lot
        min: Decimal,
        /// Maximum lot
        max: Decimal,
        /// Lot step
        step: Decimal,
    },
    /// Pip size not positive
    #[error("Pip size is not positive: {0}")]
    InvalidPipSize(Decimal),
}

/// Account value the risk fraction applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingBasis {
    /// Account equity
    #[default]
    Equity,
    /// Account balance
    Balance,
}

/// Result of a position size calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSize {
    /// Order size, clamped and quantized
    pub lots: Decimal,
    /// Intended risk (basis × fraction)
    pub risk_amount: Decimal,
    /// Risk at the rounded size
    pub actual_risk: Decimal,
    /// Pip value per lot used
    pub pip_value_per_lot: Decimal,
    /// Stop distance in pips
    pub sl_pips: Decimal,
}
