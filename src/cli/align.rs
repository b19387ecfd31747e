//! Align command implementation

use chrono::{DateTime, Utc};
use clap::Args;

use crate::calendar::CandleAligner;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Unified symbol
    pub symbol: String,

    /// Instant to align (RFC 3339), defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Validity in bars for the expiry instant
    #[arg(long)]
    pub validity: Option<u32>,
}

impl AlignArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let at = self.at.unwrap_or_else(Utc::now);
        let profile = config.calendar_for(&self.symbol);
        let aligner = CandleAligner::new(profile);
        let validity = self.validity.unwrap_or(config.general.default_validity_bars);

        println!("{} at {}", self.symbol.to_ascii_uppercase(), at.to_rfc3339());
        println!(
            "  Calendar:   {:?}, phase {} min, timeframe {} min",
            profile.session, profile.phase_minutes, profile.timeframe_minutes
        );
        println!("  Trading:    {}", aligner.is_trading_time(at));
        println!("  Bar start:  {}", aligner.bar_start(at).to_rfc3339());
        println!("  Next bar:   {}", aligner.next_bar_start(at).to_rfc3339());
        println!(
            "  Expiry:     {} ({} bars)",
            aligner.expiry_instant(at, validity).to_rfc3339(),
            validity
        );
        Ok(())
    }
}
