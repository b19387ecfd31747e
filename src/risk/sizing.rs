//! Position sizing
//!
//! Converts a risk fraction into a venue-correct lot size:
//! `lots = (basis × fraction) / (sl_pips × pip_value_per_lot)`, clamped to the
//! instrument's lot bounds and floored to its lot step.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{PositionSize, SizingBasis, SizingError};
use crate::config::GeneralConfig;
use crate::venue::{AccountContext, InstrumentSpec};

/// Largest tolerated deviation of a computed pip value from its reference
pub const MAX_PIP_VALUE_DEVIATION: Decimal = dec!(0.5);

const STANDARD_PIP: Decimal = dec!(0.0001);

/// Approximate USD pip value per standard lot, by quote currency
const REFERENCE_PIP_VALUES: &[(&str, Decimal)] = &[
    ("JPY", dec!(6.5)),
    ("CHF", dec!(11.0)),
    ("GBP", dec!(12.5)),
    ("CAD", dec!(7.2)),
    ("AUD", dec!(6.5)),
    ("NZD", dec!(5.9)),
    ("EUR", dec!(10.8)),
    ("ZAR", dec!(0.55)),
    ("MXN", dec!(0.50)),
    ("CNH", dec!(1.4)),
    ("SGD", dec!(7.4)),
    ("NOK", dec!(0.90)),
    ("HUF", dec!(0.026)),
    ("CZK", dec!(0.42)),
];

/// Reference pip value for a quote currency at a given pip size
///
/// Non-JPY pairs with a pip coarser than 0.001 are scaled from the 0.0001 value.
pub fn reference_pip_value(quote: &str, pip_size: Decimal) -> Option<Decimal> {
    let quote = quote.to_ascii_uppercase();
    let (_, value) = REFERENCE_PIP_VALUES.iter().find(|(q, _)| *q == quote)?;

    if quote != "JPY" && pip_size >= dec!(0.001) {
        Some(*value * (pip_size / STANDARD_PIP))
    } else {
        Some(*value)
    }
}

/// Risk-based position sizer
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Fraction of the basis risked per trade (0.005 = 0.5%)
    pub risk_fraction: Decimal,
    /// Account value the fraction applies to
    pub basis: SizingBasis,
}

impl PositionSizer {
    /// Create a new sizer
    pub fn new(risk_fraction: Decimal, basis: SizingBasis) -> Self {
        Self {
            risk_fraction,
            basis,
        }
    }

    /// Create from GeneralConfig
    pub fn from_config(config: &GeneralConfig) -> Self {
        Self::new(config.risk_fraction, config.sizing_basis)
    }

    /// Basis value of an account snapshot
    pub fn basis_value(&self, ctx: &AccountContext) -> Decimal {
        match self.basis {
            SizingBasis::Equity => ctx.equity,
            SizingBasis::Balance => ctx.balance,
        }
    }

    /// Size an order for an account snapshot
    pub fn size_for_account(
        &self,
        ctx: &AccountContext,
        entry: Decimal,
        stop: Decimal,
        spec: &InstrumentSpec,
        conversion_rate: Option<Decimal>,
    ) -> Result<PositionSize, SizingError> {
        self.calculate(self.basis_value(ctx), entry, stop, spec, conversion_rate)
    }

    /// Size an order
    ///
    /// `conversion_rate` is the USD/QUOTE price, needed only when the spec has
    /// no fixed pip value and is not USD-quoted.
    pub fn calculate(
        &self,
        basis_value: Decimal,
        entry: Decimal,
        stop: Decimal,
        spec: &InstrumentSpec,
        conversion_rate: Option<Decimal>,
    ) -> Result<PositionSize, SizingError> {
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction > Decimal::ONE {
            return Err(SizingError::InvalidRiskFraction(self.risk_fraction));
        }
        if basis_value <= Decimal::ZERO {
            return Err(SizingError::NonPositiveBasis(basis_value));
        }
        if spec.pip_size <= Decimal::ZERO {
            return Err(SizingError::InvalidPipSize(spec.pip_size));
        }
        if spec.lot_step <= Decimal::ZERO
            || spec.min_lot <= Decimal::ZERO
            || spec.min_lot > spec.max_lot
        {
            return Err(SizingError::InvalidLotBounds {
                min: spec.min_lot,
                max: spec.max_lot,
                step: spec.lot_step,
            });
        }

        let sl_pips = (entry - stop).abs() / spec.pip_size;
        if sl_pips.is_zero() {
            return Err(SizingError::ZeroStopDistance);
        }

        let pip_value_per_lot = Self::resolve_pip_value(spec, conversion_rate)?;
        let risk_amount = basis_value * self.risk_fraction;
        let raw_lots = risk_amount / (sl_pips * pip_value_per_lot);
        let lots = Self::quantize(raw_lots, spec);

        tracing::debug!(
            symbol = %spec.symbol,
            %risk_amount,
            %sl_pips,
            %pip_value_per_lot,
            %raw_lots,
            %lots,
            "Position sized"
        );

        Ok(PositionSize {
            lots,
            risk_amount,
            actual_risk: lots * sl_pips * pip_value_per_lot,
            pip_value_per_lot,
            sl_pips,
        })
    }

    /// Pip value per lot in account currency
    pub fn resolve_pip_value(
        spec: &InstrumentSpec,
        conversion_rate: Option<Decimal>,
    ) -> Result<Decimal, SizingError> {
        if let Some(fixed) = spec.pip_value_per_lot {
            return Self::positive(fixed);
        }

        let base = spec.contract_size * spec.pip_size;
        let quote = match spec.quote_currency.as_deref() {
            Some(q) if !spec.is_usd_quoted() => q,
            _ => return Self::positive(base),
        };
        let reference = reference_pip_value(quote, spec.pip_size);

        let computed = match conversion_rate {
            Some(rate) if rate > Decimal::ZERO => base / rate,
            _ => {
                return match reference {
                    Some(value) => {
                        tracing::warn!(
                            symbol = %spec.symbol,
                            quote,
                            %value,
                            "No conversion rate, using reference pip value"
                        );
                        Ok(value)
                    }
                    None => Err(SizingError::MissingConversionRate(quote.to_string())),
                };
            }
        };

        if let Some(reference) = reference {
            let deviation = (computed - reference).abs() / reference;
            if deviation > MAX_PIP_VALUE_DEVIATION {
                tracing::warn!(
                    symbol = %spec.symbol,
                    quote,
                    %computed,
                    %reference,
                    %deviation,
                    "Pip value sanity check failed, using reference"
                );
                return Ok(reference);
            }
        }

        Self::positive(computed)
    }

    /// Clamp to lot bounds and floor to the lot step
    fn quantize(raw_lots: Decimal, spec: &InstrumentSpec) -> Decimal {
        let clamped = raw_lots.max(spec.min_lot).min(spec.max_lot);
        let stepped = (clamped / spec.lot_step).floor() * spec.lot_step;
        stepped.max(spec.min_lot).normalize()
    }

    fn positive(value: Decimal) -> Result<Decimal, SizingError> {
        if value > Decimal::ZERO {
            Ok(value)
        } else {
            Err(SizingError::NonPositivePipValue(value))
        }
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            risk_fraction: dec!(0.005),
            basis: SizingBasis::Equity,
        }
    }
}
