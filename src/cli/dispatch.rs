//! Dispatch command implementation

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use super::{OutputFormat, PaperFleet};
use crate::config::Config;
use crate::dispatch::{AccountOutcome, OrderDispatcher, PacingWindow};
use crate::signal::Signal;

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// JSON file containing the signal
    pub signal: PathBuf,

    /// Seed for pacing jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// Submit without pacing delays
    #[arg(long)]
    pub no_pacing: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl DispatchArgs {
    pub async fn execute(&self, config: Arc<Config>) -> anyhow::Result<()> {
        let json = std::fs::read_to_string(&self.signal)?;
        let signal = Signal::from_json(&json)?;

        let fleet = PaperFleet::from_config(&config);
        let mut dispatcher = OrderDispatcher::new(Arc::clone(&config), fleet.bindings.clone());
        if self.no_pacing {
            dispatcher = dispatcher.with_pacing(PacingWindow::disabled());
        }
        if let Some(seed) = self.seed {
            dispatcher = dispatcher.with_seed(seed);
        }

        let report = dispatcher.dispatch(&signal).await?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => {
                println!(
                    "Signal {} {} {} entry={} stop={} (R:R {})",
                    report.signal_id,
                    signal.symbol,
                    signal.side,
                    signal.entry,
                    signal.stop,
                    signal.reward_risk_ratio().round_dp(2)
                );
                for result in &report.results {
                    let detail = match &result.outcome {
                        AccountOutcome::Submitted { order_id, lots } => {
                            format!("{lots} lots, order {order_id}")
                        }
                        AccountOutcome::Skipped { reasons } => reasons.join("; "),
                        AccountOutcome::Failed { error } => error.to_string(),
                    };
                    println!(
                        "  {:<16} {:<12} {:<10} {:>6}ms  {}",
                        result.account_id,
                        result.venue_id,
                        result.outcome.label(),
                        result.elapsed.as_millis(),
                        detail
                    );
                }
                println!(
                    "Submitted {}, skipped {}, failed {} in {}ms",
                    report.submitted_count(),
                    report.skipped_count(),
                    report.failed_count(),
                    report.elapsed.as_millis()
                );
            }
        }
        Ok(())
    }
}
