//! CLI interface for signal-fanout
//!
//! Provides subcommands for:
//! - `config`: Show resolved configuration
//! - `size`: Offline lot size calculation
//! - `align`: Bar boundaries and expiry for a symbol
//! - `dispatch`: Fan a JSON signal out to paper venues
//! - `sweep`: Run the expiration reconciler over paper venues

mod align;
mod dispatch;
mod paper;
mod size;
mod sweep;

pub use align::AlignArgs;
pub use dispatch::DispatchArgs;
pub use paper::PaperFleet;
pub use size::SizeArgs;
pub use sweep::SweepArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "signal-fanout")]
#[command(about = "Fan trading signals out to multiple brokerage accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show resolved configuration
    Config,
    /// Compute a lot size for a configured instrument
    Size(SizeArgs),
    /// Show bar boundaries and expiry for a symbol
    Align(AlignArgs),
    /// Dispatch a JSON signal to paper venues
    Dispatch(DispatchArgs),
    /// Reconcile pending orders on paper venues
    Sweep(SweepArgs),
}

/// Output format for command results
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON document
    Json,
}
