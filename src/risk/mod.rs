//! Risk management module
//!
//! Position sizing and pre-placement account filters

mod filters;
mod sizing;
mod types;

pub use filters::{FilterCheck, FilterEngine, FilterKind, FilterThresholds, FilterVerdict};
pub use sizing::{reference_pip_value, PositionSizer, MAX_PIP_VALUE_DEVIATION};
pub use types::{PositionSize, SizingBasis, SizingError};
