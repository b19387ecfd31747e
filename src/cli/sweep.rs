//! Sweep command implementation

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Args;
use tokio::sync::watch;

use super::{OutputFormat, PaperFleet};
use crate::config::Config;
use crate::reconcile::{AccountStatus, Disposition, ExpirationReconciler, SweepReport};
use crate::venue::{AccountBinding, PendingOrder};

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// JSON file with pending orders to seed the paper venues with
    #[arg(long)]
    pub orders: Option<PathBuf>,

    /// Instant to count bars against (RFC 3339), defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Report expired orders without cancelling them
    #[arg(long)]
    pub dry_run: bool,

    /// Only sweep these accounts (repeatable)
    #[arg(long = "account", value_name = "ID")]
    pub accounts: Vec<String>,

    /// Keep sweeping on the configured interval until Ctrl-C
    #[arg(long)]
    pub watch: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl SweepArgs {
    pub async fn execute(&self, config: Arc<Config>) -> anyhow::Result<()> {
        let fleet = PaperFleet::from_config(&config);

        if let Some(path) = &self.orders {
            let orders: Vec<PendingOrder> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            for order in orders {
                let venue = fleet.venue_for(&order.account_id).ok_or_else(|| {
                    anyhow::anyhow!(
                        "order {} references unknown account {}",
                        order.order_id,
                        order.account_id
                    )
                })?;
                venue.insert_pending(order).await;
            }
        }

        let bindings = self.select_accounts(&fleet)?;
        let reconciler =
            Arc::new(ExpirationReconciler::new(&config, bindings).with_dry_run(self.dry_run));

        if self.watch {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });
            reconciler.run(shutdown_rx).await;
            return Ok(());
        }

        let report = match self.at {
            Some(at) => reconciler.sweep_at(at).await,
            None => reconciler.sweep().await,
        };
        self.print(&report)
    }

    fn select_accounts(&self, fleet: &PaperFleet) -> anyhow::Result<Vec<AccountBinding>> {
        if self.accounts.is_empty() {
            return Ok(fleet.bindings.clone());
        }
        if let Some(unknown) = self
            .accounts
            .iter()
            .find(|id| !fleet.bindings.iter().any(|b| &b.account_id == *id))
        {
            anyhow::bail!("unknown account {unknown}");
        }
        Ok(fleet
            .bindings
            .iter()
            .filter(|b| self.accounts.contains(&b.account_id))
            .cloned()
            .collect())
    }

    fn print(&self, report: &SweepReport) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(report)?);
            return Ok(());
        }

        if report.dry_run {
            println!("Sweep at {} (dry run)", report.swept_at.to_rfc3339());
        } else {
            println!("Sweep at {}", report.swept_at.to_rfc3339());
        }
        for account in &report.accounts {
            match &account.status {
                AccountStatus::Exempt => {
                    println!("  {:<16} exempt (native expiry)", account.account_id);
                }
                AccountStatus::ListFailed { error } => {
                    println!("  {:<16} list failed: {}", account.account_id, error);
                }
                AccountStatus::Swept => {
                    println!("  {:<16} {} pending", account.account_id, account.orders.len());
                }
            }
            for order in &account.orders {
                let detail = match &order.disposition {
                    Disposition::Cancelled { elapsed, validity } => {
                        format!("cancelled ({elapsed}/{validity} bars)")
                    }
                    Disposition::Expired { elapsed, validity } => {
                        format!("expired ({elapsed}/{validity} bars), left in place")
                    }
                    Disposition::AlreadyGone => "already gone".to_string(),
                    Disposition::CancelFailed { error } => format!("cancel failed: {error}"),
                    Disposition::StillPending {
                        elapsed,
                        validity,
                        expires_at,
                    } => format!(
                        "pending ({elapsed}/{validity} bars, expires {})",
                        expires_at.to_rfc3339()
                    ),
                };
                println!("    {:<38} {:<8} {}", order.order_id, order.symbol, detail);
            }
        }
        println!(
            "Cancelled {}, expired {}, already gone {}, failed {}, pending {}",
            report.cancelled_count(),
            report.expired_count(),
            report.already_gone_count(),
            report.cancel_failed_count(),
            report.still_pending_count()
        );
        Ok(())
    }
}
