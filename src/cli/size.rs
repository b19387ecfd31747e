//! Size command implementation

use clap::Args;
use rust_decimal::Decimal;

use crate::config::Config;
use crate::risk::PositionSizer;

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Unified symbol
    pub symbol: String,

    /// Entry price
    #[arg(long)]
    pub entry: Decimal,

    /// Stop price
    #[arg(long)]
    pub stop: Decimal,

    /// Account equity (or balance, per sizing_basis)
    #[arg(long)]
    pub equity: Decimal,

    /// Venue whose symbol mapping to use
    #[arg(long)]
    pub venue: Option<String>,

    /// Override the configured risk fraction
    #[arg(long)]
    pub risk: Option<Decimal>,

    /// USD/QUOTE conversion rate for non-USD quoted pairs
    #[arg(long)]
    pub rate: Option<Decimal>,
}

impl SizeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let symbol = self.symbol.to_ascii_uppercase();
        let venue = self.venue.clone().unwrap_or_else(|| {
            config
                .instruments
                .get(&symbol)
                .and_then(|i| i.venues.keys().min().cloned())
                .unwrap_or_else(|| "paper".to_string())
        });
        let spec = config
            .instrument_spec(&venue, &symbol)
            .ok_or_else(|| anyhow::anyhow!("{symbol} is not configured for venue {venue}"))?;

        let mut sizer = PositionSizer::from_config(&config.general);
        if let Some(risk) = self.risk {
            sizer.risk_fraction = risk;
        }

        let size = sizer.calculate(self.equity, self.entry, self.stop, &spec, self.rate)?;

        println!("{} on {} ({})", symbol, venue, spec.venue_symbol);
        println!("  Risk:        {} × {} = {}", self.equity, sizer.risk_fraction, size.risk_amount);
        println!("  Stop:        {} pips", size.sl_pips.round_dp(1));
        println!("  Pip value:   {} per lot", size.pip_value_per_lot.round_dp(4));
        println!("  Lots:        {}", size.lots);
        println!("  Actual risk: {}", size.actual_risk.round_dp(2));
        Ok(())
    }
}
