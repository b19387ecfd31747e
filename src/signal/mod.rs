//! Signal module
//!
//! Validated trade intents handed over by the ingestion layer

mod types;

pub use types::{Side, Signal, SignalError};
