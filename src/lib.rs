//! signal-fanout: fan trading signals out to multiple brokerage accounts
//!
//! This library provides the core components for:
//! - Risk-based position sizing across quoting conventions
//! - Pre-placement margin, drawdown and duplication filters
//! - Paced limit-order dispatch to every enabled account
//! - Candle-aligned bar arithmetic on market calendars
//! - Expiration sweeps that cancel stale pending orders
//! - A uniform venue capability with an in-memory paper venue
//! - Full observability stack

pub mod calendar;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod reconcile;
pub mod risk;
pub mod signal;
pub mod telemetry;
pub mod venue;
