//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Context fetch, filters and sizing for one account
    AccountEvaluation,
    /// Venue submission call
    OrderSubmission,
    /// Full dispatch of one signal
    Dispatch,
    /// One reconciliation sweep
    Sweep,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Signals dispatched
    SignalsDispatched,
    /// Accounts with a submitted order
    AccountSubmitted,
    /// Accounts skipped by filters
    AccountSkipped,
    /// Accounts that failed
    AccountFailed,
    /// Orders cancelled by the reconciler
    OrdersCancelled,
    /// Cancel calls that failed
    CancelFailures,
    /// Pending order listings that failed
    ListFailures,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Pending orders left after the last sweep
    PendingOrders,
    /// Enabled accounts
    EnabledAccounts,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::AccountEvaluation => "fanout_account_evaluation_seconds",
        LatencyMetric::OrderSubmission => "fanout_order_submission_seconds",
        LatencyMetric::Dispatch => "fanout_dispatch_seconds",
        LatencyMetric::Sweep => "fanout_sweep_seconds",
    };
    ::metrics::histogram!(metric_name).record(duration.as_secs_f64());
}

/// Increment a counter
pub fn increment(metric: CounterMetric) {
    let metric_name = match metric {
        CounterMetric::SignalsDispatched => "fanout_signals_dispatched_total",
        CounterMetric::AccountSubmitted => "fanout_accounts_submitted_total",
        CounterMetric::AccountSkipped => "fanout_accounts_skipped_total",
        CounterMetric::AccountFailed => "fanout_accounts_failed_total",
        CounterMetric::OrdersCancelled => "fanout_orders_cancelled_total",
        CounterMetric::CancelFailures => "fanout_cancel_failures_total",
        CounterMetric::ListFailures => "fanout_list_failures_total",
    };
    ::metrics::counter!(metric_name).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::PendingOrders => "fanout_pending_orders",
        GaugeMetric::EnabledAccounts => "fanout_enabled_accounts",
    };
    ::metrics::gauge!(metric_name).set(value);
}

/// Install the Prometheus recorder and serve `/metrics` on `port`
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
