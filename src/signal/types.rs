//! Signal types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Trading side
///
/// Deserializes through [`FromStr`], so `BUY`, `Long` and `short` are all accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Side {
    /// Buy limit below market
    Buy,
    /// Sell limit above market
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Side::Buy),
            "sell" | "short" => Ok(Side::Sell),
            other => Err(SignalError::UnknownSide(other.to_string())),
        }
    }
}

impl TryFrom<String> for Side {
    type Error = SignalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Signal validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// Side string not recognised
    #[error("Unknown side: {0}")]
    UnknownSide(String),
    /// Symbol is empty
    #[error("Signal has no symbol")]
    MissingSymbol,
    /// A price is zero or negative
    #[error("Non-positive {field} price: {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },
    /// Entry equals stop
    #[error("Entry equals stop ({0})")]
    ZeroRisk(Decimal),
    /// Stop is on the profit side of entry
    #[error("Stop {stop} is on the wrong side of entry {entry} for a {side} order")]
    StopWrongSide {
        side: Side,
        entry: Decimal,
        stop: Decimal,
    },
    /// Target is on the loss side of entry
    #[error("Target {target} is on the wrong side of entry {entry} for a {side} order")]
    TargetWrongSide {
        side: Side,
        entry: Decimal,
        target: Decimal,
    },
    /// Validity override of zero bars
    #[error("Validity must be at least one bar")]
    ZeroValidity,
}

/// A normalized trade intent produced by the ingestion layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Unified symbol (e.g. "EURUSD")
    pub symbol: String,
    /// Trade direction
    pub side: Side,
    /// Limit entry price
    pub entry: Decimal,
    /// Stop-loss price
    #[serde(alias = "sl")]
    pub stop: Decimal,
    /// Take-profit price
    #[serde(default, alias = "tp")]
    pub target: Option<Decimal>,
    /// Validity override in bars
    #[serde(default)]
    pub validity_bars: Option<u32>,
    /// Chart timeframe label the signal was produced on
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Receive timestamp
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

fn default_timeframe() -> String {
    "H4".to_string()
}

impl Signal {
    /// Create a new signal
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        entry: Decimal,
        stop: Decimal,
        target: Option<Decimal>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into().to_ascii_uppercase(),
            side,
            entry,
            stop,
            target,
            validity_bars: None,
            timeframe: default_timeframe(),
            received_at: Utc::now(),
        }
    }

    /// Set the validity override
    pub fn with_validity_bars(mut self, bars: u32) -> Self {
        self.validity_bars = Some(bars);
        self
    }

    /// Parse a signal from a JSON document
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let mut signal: Signal = serde_json::from_str(json)?;
        signal.symbol = signal.symbol.trim().to_ascii_uppercase();
        signal.validate()?;
        Ok(signal)
    }

    /// Price distance between entry and stop
    pub fn risk_distance(&self) -> Decimal {
        (self.entry - self.stop).abs()
    }

    /// Reward to risk ratio, zero without a target or risk
    pub fn reward_risk_ratio(&self) -> Decimal {
        let risk = self.risk_distance();
        match self.target {
            Some(target) if !risk.is_zero() => (target - self.entry).abs() / risk,
            _ => Decimal::ZERO,
        }
    }

    /// Check price geometry
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.symbol.is_empty() {
            return Err(SignalError::MissingSymbol);
        }
        for (field, value) in [("entry", self.entry), ("stop", self.stop)] {
            if value <= Decimal::ZERO {
                return Err(SignalError::NonPositivePrice { field, value });
            }
        }
        if self.entry == self.stop {
            return Err(SignalError::ZeroRisk(self.entry));
        }

        let stop_ok = match self.side {
            Side::Buy => self.stop < self.entry,
            Side::Sell => self.stop > self.entry,
        };
        if !stop_ok {
            return Err(SignalError::StopWrongSide {
                side: self.side,
                entry: self.entry,
                stop: self.stop,
            });
        }

        if let Some(target) = self.target {
            if target <= Decimal::ZERO {
                return Err(SignalError::NonPositivePrice {
                    field: "target",
                    value: target,
                });
            }
            let target_ok = match self.side {
                Side::Buy => target > self.entry,
                Side::Sell => target < self.entry,
            };
            if !target_ok {
                return Err(SignalError::TargetWrongSide {
                    side: self.side,
                    entry: self.entry,
                    target,
                });
            }
        }

        if self.validity_bars == Some(0) {
            return Err(SignalError::ZeroValidity);
        }

        Ok(())
    }
}
