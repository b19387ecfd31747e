use std::sync::Arc;

use clap::Parser;
use signal_fanout::cli::{Cli, Commands};
use signal_fanout::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using example configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };
    let config = Arc::new(config);

    // Initialize telemetry
    let _telemetry = signal_fanout::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Risk: {}% of {:?}, default validity {} bars",
                config.general.risk_fraction * rust_decimal_macros::dec!(100),
                config.general.sizing_basis,
                config.general.default_validity_bars
            );
            println!(
                "  Pacing: {}-{}ms",
                config.pacing.min_delay_ms, config.pacing.max_delay_ms
            );
            println!(
                "  Filters: margin>={}%, drawdown<{}%, positions<{}, pending<{:?}, duplicates={}",
                config.filters.min_free_margin_pct,
                config.filters.max_daily_drawdown_pct,
                config.filters.max_open_positions,
                config.filters.max_pending_orders,
                config.filters.prevent_duplicates
            );
            println!(
                "  Reconciler: every {}s, exempt native expiry={}",
                config.reconciler.interval_secs, config.reconciler.exempt_native_expiry
            );
            for account in &config.accounts {
                println!(
                    "  Account {} on {} (enabled={}, native_expiry={})",
                    account.id, account.venue, account.enabled, account.native_expiry
                );
            }
            for symbol in config.instruments.keys() {
                let profile = config.calendar_for(symbol);
                println!(
                    "  Instrument {}: {:?}, phase {} min, {} min bars",
                    symbol, profile.session, profile.phase_minutes, profile.timeframe_minutes
                );
            }
        }
        Commands::Size(args) => args.execute(&config).await?,
        Commands::Align(args) => args.execute(&config).await?,
        Commands::Dispatch(args) => {
            tracing::info!("Dispatching signal to paper venues");
            args.execute(config).await?;
        }
        Commands::Sweep(args) => {
            tracing::info!("Reconciling paper venues");
            args.execute(config).await?;
        }
    }

    Ok(())
}
