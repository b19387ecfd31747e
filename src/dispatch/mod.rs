//! Dispatch module
//!
//! Per-account filtering, sizing and paced submission of one signal

mod dispatcher;
mod pacing;
mod types;

pub use dispatcher::{order_label, OrderDispatcher};
pub use pacing::{Pacer, PacingWindow};
pub use types::{AccountOutcome, AccountResult, DispatchError, DispatchReport};
