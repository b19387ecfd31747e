//! Expiration sweep integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use signal_fanout::calendar::MarketCalendarProfile;
use signal_fanout::config::Config;
use signal_fanout::reconcile::{AccountStatus, Disposition, ExpirationReconciler};
use signal_fanout::signal::Side;
use signal_fanout::venue::{
    AccountBinding, AccountContext, CancelOutcome, InstrumentSpec, OrderRequest, PaperAccount,
    PaperOp, PaperVenue, PendingOrder, VenueAdapter, VenueError,
};
use tokio::sync::watch;

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn order(account: &str, id: &str, symbol: &str, created_at: DateTime<Utc>) -> PendingOrder {
    PendingOrder {
        order_id: id.to_string(),
        account_id: account.to_string(),
        symbol: symbol.to_string(),
        side: Side::Buy,
        created_at,
        validity_bars: Some(4),
        profile: None,
        entry: dec!(1.0400),
        stop: dec!(1.0350),
        target: None,
        lots: dec!(0.1),
        expires_at: None,
    }
}

fn bind(id: &str, venue: &Arc<PaperVenue>) -> AccountBinding {
    let venue: Arc<dyn VenueAdapter> = venue.clone();
    AccountBinding::new(id, venue)
}

fn paper(accounts: &[&str]) -> Arc<PaperVenue> {
    let venue = accounts.iter().fold(PaperVenue::new("paper"), |venue, id| {
        venue.with_account(PaperAccount::new(*id, dec!(10000)))
    });
    Arc::new(venue)
}

/// Wednesday 12:30 UTC, inside the 10:00 bar of a 4h forex calendar
fn midweek() -> DateTime<Utc> {
    utc(2024, 3, 13, 12, 30)
}

#[tokio::test]
async fn test_cancels_at_validity_boundary() {
    let venue = paper(&["acc"]);
    let now = midweek();
    venue.insert_pending(order("acc", "five", "EURUSD", utc(2024, 3, 12, 14, 30))).await;
    venue.insert_pending(order("acc", "four", "EURUSD", utc(2024, 3, 12, 18, 10))).await;
    venue.insert_pending(order("acc", "three", "EURUSD", utc(2024, 3, 12, 22, 30))).await;

    let reconciler = ExpirationReconciler::new(&Config::default(), vec![bind("acc", &venue)]);
    let report = reconciler.sweep_at(now).await;

    assert_eq!(
        report.disposition("five"),
        Some(&Disposition::Cancelled {
            elapsed: 5,
            validity: 4
        })
    );
    assert_eq!(
        report.disposition("four"),
        Some(&Disposition::Cancelled {
            elapsed: 4,
            validity: 4
        })
    );
    match report.disposition("three") {
        Some(Disposition::StillPending {
            elapsed,
            validity,
            expires_at,
        }) => {
            assert_eq!((*elapsed, *validity), (3, 4));
            assert_eq!(*expires_at, utc(2024, 3, 13, 14, 0));
        }
        other => panic!("unexpected disposition: {other:?}"),
    }

    let remaining: Vec<String> = venue
        .pending("acc")
        .await
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(remaining, vec!["three".to_string()]);
}

#[tokio::test]
async fn test_dry_run_leaves_expired_orders() {
    let venue = paper(&["acc"]);
    venue.insert_pending(order("acc", "five", "EURUSD", utc(2024, 3, 12, 14, 30))).await;
    venue.insert_pending(order("acc", "three", "EURUSD", utc(2024, 3, 12, 22, 30))).await;

    let reconciler = ExpirationReconciler::new(&Config::default(), vec![bind("acc", &venue)])
        .with_dry_run(true);
    let report = reconciler.sweep_at(midweek()).await;

    assert!(report.dry_run);
    assert_eq!(
        report.disposition("five"),
        Some(&Disposition::Expired {
            elapsed: 5,
            validity: 4
        })
    );
    assert!(matches!(
        report.disposition("three"),
        Some(Disposition::StillPending { elapsed: 3, .. })
    ));
    assert_eq!(report.expired_count(), 1);
    assert_eq!(report.cancelled_count(), 0);
    assert!(venue.cancels().await.is_empty());
    assert_eq!(venue.pending("acc").await.len(), 2);
}

#[tokio::test]
async fn test_weekend_bars_not_counted() {
    let venue = paper(&["acc"]);
    let created = utc(2024, 3, 15, 15, 0);
    let now = utc(2024, 3, 17, 23, 0);

    venue.insert_pending(order("acc", "fx", "EURUSD", created)).await;
    let mut crypto = order("acc", "btc", "BTCUSD", created);
    crypto.profile = Some(MarketCalendarProfile::continuous(240));
    venue.insert_pending(crypto).await;

    let reconciler = ExpirationReconciler::new(&Config::default(), vec![bind("acc", &venue)]);
    let report = reconciler.sweep_at(now).await;

    // Friday 14:00 and 18:00 closed before the weekend; Sunday 22:00 is still open
    assert!(matches!(
        report.disposition("fx"),
        Some(Disposition::StillPending { elapsed: 2, .. })
    ));
    assert!(matches!(
        report.disposition("btc"),
        Some(Disposition::Cancelled { elapsed: 14, .. })
    ));
}

#[tokio::test]
async fn test_cancel_failure_does_not_stop_sweep() {
    let venue = paper(&["acc-1", "acc-2"]);
    let created = utc(2024, 3, 11, 10, 0);
    venue.insert_pending(order("acc-1", "stuck", "EURUSD", created)).await;
    venue.insert_pending(order("acc-2", "stale", "EURUSD", created)).await;
    venue
        .fail_on("acc-1", PaperOp::Cancel, VenueError::Connectivity("reset by peer".into()))
        .await;

    let reconciler = ExpirationReconciler::new(
        &Config::default(),
        vec![bind("acc-1", &venue), bind("acc-2", &venue)],
    );
    let report = reconciler.sweep_at(midweek()).await;

    assert!(matches!(
        report.disposition("stuck"),
        Some(Disposition::CancelFailed { error }) if error.contains("reset by peer")
    ));
    assert!(matches!(
        report.disposition("stale"),
        Some(Disposition::Cancelled { .. })
    ));
    assert_eq!(report.cancel_failed_count(), 1);
    assert_eq!(report.cancelled_count(), 1);

    // Left in place for the next sweep
    assert_eq!(venue.pending("acc-1").await.len(), 1);
    assert!(venue.pending("acc-2").await.is_empty());
}

#[tokio::test]
async fn test_list_failure_isolated() {
    let venue = paper(&["down", "up"]);
    venue.insert_pending(order("up", "old", "EURUSD", utc(2024, 3, 11, 10, 0))).await;
    venue
        .fail_on("down", PaperOp::List, VenueError::Auth("token expired".into()))
        .await;

    let reconciler = ExpirationReconciler::new(
        &Config::default(),
        vec![bind("down", &venue), bind("up", &venue)],
    );
    let report = reconciler.sweep_at(midweek()).await;

    let down = report.account("down").unwrap();
    assert!(matches!(&down.status, AccountStatus::ListFailed { error } if error.contains("token expired")));
    assert!(down.orders.is_empty());
    assert_eq!(report.account("up").unwrap().status, AccountStatus::Swept);
    assert_eq!(report.cancelled_count(), 1);
}

#[tokio::test]
async fn test_native_expiry_accounts_exempt() {
    let native = Arc::new(
        PaperVenue::new("ctrader")
            .with_native_expiry(true)
            .with_account(PaperAccount::new("ct-1", dec!(10000)))
            .with_account(PaperAccount::new("ct-2", dec!(10000))),
    );
    let created = utc(2024, 3, 11, 10, 0);
    native.insert_pending(order("ct-1", "kept", "EURUSD", created)).await;
    native.insert_pending(order("ct-2", "swept", "EURUSD", created)).await;

    let accounts = vec![
        bind("ct-1", &native),
        bind("ct-2", &native).exempt_native_expiry(false),
    ];
    let reconciler = ExpirationReconciler::new(&Config::default(), accounts);
    let report = reconciler.sweep_at(midweek()).await;

    assert_eq!(report.account("ct-1").unwrap().status, AccountStatus::Exempt);
    assert!(report.disposition("kept").is_none());
    assert_eq!(native.pending("ct-1").await.len(), 1);

    assert!(matches!(
        report.disposition("swept"),
        Some(Disposition::Cancelled { .. })
    ));
}

#[tokio::test]
async fn test_global_exemption_switch() {
    let native = Arc::new(
        PaperVenue::new("ctrader")
            .with_native_expiry(true)
            .with_account(PaperAccount::new("ct", dec!(10000))),
    );
    native.insert_pending(order("ct", "old", "EURUSD", utc(2024, 3, 11, 10, 0))).await;

    let config: Config = toml::from_str("[reconciler]\nexempt_native_expiry = false").unwrap();
    let reconciler = ExpirationReconciler::new(&config, vec![bind("ct", &native)]);
    let report = reconciler.sweep_at(midweek()).await;

    assert_eq!(report.account("ct").unwrap().status, AccountStatus::Swept);
    assert_eq!(report.cancelled_count(), 1);
}

#[tokio::test]
async fn test_disabled_accounts_not_swept() {
    let venue = paper(&["on", "off"]);
    let created = utc(2024, 3, 11, 10, 0);
    venue.insert_pending(order("off", "ignored", "EURUSD", created)).await;

    let reconciler = ExpirationReconciler::new(
        &Config::default(),
        vec![bind("on", &venue), bind("off", &venue).enabled(false)],
    );
    let report = reconciler.sweep_at(midweek()).await;

    assert_eq!(report.accounts.len(), 1);
    assert!(report.account("off").is_none());
    assert_eq!(venue.pending("off").await.len(), 1);
}

/// Venue whose orders trigger between listing and cancellation
struct RacyVenue {
    inner: Arc<PaperVenue>,
}

#[async_trait]
impl VenueAdapter for RacyVenue {
    fn venue_id(&self) -> &str {
        self.inner.venue_id()
    }

    fn supports_native_expiry(&self) -> bool {
        false
    }

    async fn get_account_context(&self, account_id: &str) -> Result<AccountContext, VenueError> {
        self.inner.get_account_context(account_id).await
    }

    async fn list_instruments(&self, account_id: &str) -> Result<Vec<InstrumentSpec>, VenueError> {
        self.inner.list_instruments(account_id).await
    }

    async fn get_price(&self, account_id: &str, symbol: &str) -> Result<Decimal, VenueError> {
        self.inner.get_price(account_id, symbol).await
    }

    async fn submit_limit_order(
        &self,
        account_id: &str,
        request: &OrderRequest,
    ) -> Result<PendingOrder, VenueError> {
        self.inner.submit_limit_order(account_id, request).await
    }

    async fn list_pending_orders(&self, account_id: &str) -> Result<Vec<PendingOrder>, VenueError> {
        self.inner.list_pending_orders(account_id).await
    }

    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<CancelOutcome, VenueError> {
        self.inner.trigger(account_id, order_id).await;
        self.inner.cancel_order(account_id, order_id).await
    }
}

#[tokio::test]
async fn test_order_gone_before_cancel() {
    let inner = paper(&["acc"]);
    inner.insert_pending(order("acc", "filled", "EURUSD", utc(2024, 3, 11, 10, 0))).await;
    let racy: Arc<dyn VenueAdapter> = Arc::new(RacyVenue {
        inner: inner.clone(),
    });

    let reconciler =
        ExpirationReconciler::new(&Config::default(), vec![AccountBinding::new("acc", racy)]);
    let report = reconciler.sweep_at(midweek()).await;

    assert_eq!(report.disposition("filled"), Some(&Disposition::AlreadyGone));
    assert_eq!(report.already_gone_count(), 1);
    assert_eq!(report.cancel_failed_count(), 0);
    assert!(inner.cancels().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_accounts_swept_concurrently() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_latency(Duration::from_secs(1))
            .with_account(PaperAccount::new("a", dec!(10000)))
            .with_account(PaperAccount::new("b", dec!(10000)))
            .with_account(PaperAccount::new("c", dec!(10000))),
    );
    let created = utc(2024, 3, 11, 10, 0);
    for (account, id) in [("a", "a1"), ("a", "a2"), ("b", "b1"), ("c", "c1")] {
        venue.insert_pending(order(account, id, "EURUSD", created)).await;
    }

    let accounts = ["a", "b", "c"].iter().map(|id| bind(id, &venue)).collect();
    let reconciler = ExpirationReconciler::new(&Config::default(), accounts);
    let report = reconciler.sweep_at(midweek()).await;

    assert_eq!(report.cancelled_count(), 4);
    // One listing round plus one cancel round
    assert!(report.elapsed < Duration::from_secs(3), "sweep took {:?}", report.elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_run_sweeps_until_shutdown() {
    let venue = paper(&["acc"]);
    let mut stale = order("acc", "stale", "BTCUSD", Utc::now() - chrono::Duration::days(3));
    stale.profile = Some(MarketCalendarProfile::continuous(240));
    venue.insert_pending(stale).await;

    let config: Config = toml::from_str("[reconciler]\ninterval_secs = 60").unwrap();
    let reconciler = Arc::new(ExpirationReconciler::new(&config, vec![bind("acc", &venue)]));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        venue.cancels().await,
        vec![("acc".to_string(), "stale".to_string())]
    );

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_inflight_cancel_finish() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_latency(Duration::from_secs(1))
            .with_account(PaperAccount::new("acc", dec!(10000))),
    );
    let mut stale = order("acc", "stale", "BTCUSD", Utc::now() - chrono::Duration::days(3));
    stale.profile = Some(MarketCalendarProfile::continuous(240));
    venue.insert_pending(stale).await;

    let config: Config = toml::from_str("[reconciler]\ninterval_secs = 60").unwrap();
    let reconciler = Arc::new(ExpirationReconciler::new(&config, vec![bind("acc", &venue)]));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(reconciler.run(shutdown_rx));

    // Listing takes the first second, the cancel is in flight during the next
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(venue.cancels().await.is_empty());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(
        venue.cancels().await,
        vec![("acc".to_string(), "stale".to_string())]
    );
    assert!(venue.pending("acc").await.is_empty());
}
