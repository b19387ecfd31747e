//! Candle-aligned expiration of pending orders
//!
//! Each sweep lists pending orders per account, counts the trading bars
//! elapsed since each order was created and cancels those that reached their
//! validity. Accounts are swept concurrently; within an account cancels are
//! issued concurrently once the listing has completed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use super::{
    AccountStatus, AccountSweep, Disposition, OrderDisposition, ReconcilerConfig, SweepReport,
};
use crate::calendar::{CalendarResolver, CandleAligner};
use crate::config::Config;
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use crate::venue::{AccountBinding, CancelOutcome, PendingOrder};

/// Periodic sweep that cancels orders past their validity window
pub struct ExpirationReconciler {
    accounts: Vec<AccountBinding>,
    calendars: CalendarResolver,
    default_validity_bars: u32,
    config: ReconcilerConfig,
    dry_run: bool,
}

impl ExpirationReconciler {
    /// Create a reconciler over accounts in configured order
    pub fn new(config: &Config, accounts: Vec<AccountBinding>) -> Self {
        Self {
            accounts,
            calendars: config.calendar_resolver(),
            default_validity_bars: config.general.default_validity_bars,
            config: config.reconciler.clone(),
            dry_run: false,
        }
    }

    /// Report expired orders without cancelling them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sweep against the current instant
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep with bar counts computed against `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let started = Instant::now();
        let accounts = join_all(
            self.accounts
                .iter()
                .filter(|a| a.enabled)
                .map(|binding| self.sweep_account(binding, now)),
        )
        .await;

        let report = SweepReport {
            swept_at: now,
            elapsed: started.elapsed(),
            dry_run: self.dry_run,
            accounts,
        };

        telemetry::record_latency(LatencyMetric::Sweep, report.elapsed);
        telemetry::set_gauge(GaugeMetric::PendingOrders, report.still_pending_count() as f64);
        tracing::info!(
            cancelled = report.cancelled_count(),
            expired = report.expired_count(),
            already_gone = report.already_gone_count(),
            cancel_failed = report.cancel_failed_count(),
            pending = report.still_pending_count(),
            "Sweep complete"
        );
        report
    }

    async fn sweep_account(&self, binding: &AccountBinding, now: DateTime<Utc>) -> AccountSweep {
        let account_id = binding.account_id.as_str();
        let mut sweep = AccountSweep {
            account_id: binding.account_id.clone(),
            venue_id: binding.venue_id().to_string(),
            status: AccountStatus::Swept,
            orders: vec![],
        };

        if self.config.exempt_native_expiry
            && binding.exempt_native_expiry
            && binding.venue.supports_native_expiry()
        {
            tracing::debug!(account = account_id, "Native expiry, account exempt");
            sweep.status = AccountStatus::Exempt;
            return sweep;
        }

        let orders = match binding.venue.list_pending_orders(account_id).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(account = account_id, error = %e, "Listing pending orders failed");
                telemetry::increment(CounterMetric::ListFailures);
                sweep.status = AccountStatus::ListFailed {
                    error: e.to_string(),
                };
                return sweep;
            }
        };

        sweep.orders = join_all(
            orders
                .into_iter()
                .map(|order| self.reconcile_order(binding, order, now)),
        )
        .await;
        sweep
    }

    async fn reconcile_order(
        &self,
        binding: &AccountBinding,
        order: PendingOrder,
        now: DateTime<Utc>,
    ) -> OrderDisposition {
        let profile = order
            .profile
            .unwrap_or_else(|| self.calendars.resolve(&order.symbol));
        let aligner = CandleAligner::new(profile);
        let validity = order.validity_bars.unwrap_or(self.default_validity_bars);
        let elapsed = aligner.elapsed_bars(order.created_at, now);

        let disposition = if elapsed < validity {
            Disposition::StillPending {
                elapsed,
                validity,
                expires_at: aligner.expiry_instant(order.created_at, validity),
            }
        } else if self.dry_run {
            tracing::info!(
                account = %binding.account_id,
                order_id = %order.order_id,
                symbol = %order.symbol,
                elapsed,
                validity,
                "Dry run, expired order left in place"
            );
            Disposition::Expired { elapsed, validity }
        } else {
            self.cancel(binding, &order, elapsed, validity).await
        };

        OrderDisposition {
            order_id: order.order_id,
            symbol: order.symbol,
            created_at: order.created_at,
            disposition,
        }
    }

    async fn cancel(
        &self,
        binding: &AccountBinding,
        order: &PendingOrder,
        elapsed: u32,
        validity: u32,
    ) -> Disposition {
        let account_id = binding.account_id.as_str();
        match binding.venue.cancel_order(account_id, &order.order_id).await {
            Ok(CancelOutcome::Cancelled) => {
                tracing::info!(
                    account = account_id,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    elapsed,
                    validity,
                    "Expired order cancelled"
                );
                telemetry::increment(CounterMetric::OrdersCancelled);
                Disposition::Cancelled { elapsed, validity }
            }
            Ok(CancelOutcome::NotFound) => {
                tracing::info!(
                    account = account_id,
                    order_id = %order.order_id,
                    "Expired order already gone"
                );
                Disposition::AlreadyGone
            }
            Err(e) => {
                tracing::warn!(
                    account = account_id,
                    order_id = %order.order_id,
                    error = %e,
                    "Cancel failed, will retry next sweep"
                );
                telemetry::increment(CounterMetric::CancelFailures);
                Disposition::CancelFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Sweep on a fixed interval until `shutdown` turns true
    ///
    /// Shutdown is observed between sweeps only, so in-flight cancels finish.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval().as_secs(),
            accounts = self.accounts.iter().filter(|a| a.enabled).count(),
            "Reconciler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconciler stopped");
    }
}
