//! Order dispatch integration tests

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use signal_fanout::config::Config;
use signal_fanout::dispatch::{AccountOutcome, DispatchError, OrderDispatcher, PacingWindow};
use signal_fanout::risk::{PositionSizer, SizingError};
use signal_fanout::signal::{Side, Signal};
use signal_fanout::venue::{
    AccountBinding, PaperAccount, PaperOp, PaperVenue, VenueAdapter, VenueError,
};

const CONFIG: &str = r#"
    [general]
    risk_fraction = 0.01

    [filters]
    min_free_margin_pct = 50
    max_daily_drawdown_pct = 4
    max_open_positions = 5

    [instruments.EURUSD]
    pip_size = 0.0001
    pip_value_per_lot = 10
    quote_currency = "USD"

    [instruments.USDJPY]
    pip_size = 0.01
    quote_currency = "JPY"

    [instruments.USDTRY]
    pip_size = 0.0001
    quote_currency = "TRY"
"#;

fn config() -> Arc<Config> {
    Arc::new(toml::from_str(CONFIG).unwrap())
}

fn eurusd_buy() -> Signal {
    Signal::new("EURUSD", Side::Buy, dec!(1.0400), dec!(1.0350), Some(dec!(1.0500)))
}

fn bind(id: &str, venue: &Arc<PaperVenue>) -> AccountBinding {
    let venue: Arc<dyn VenueAdapter> = venue.clone();
    AccountBinding::new(id, venue)
}

#[tokio::test]
async fn test_margin_denied_and_submitted() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_account(PaperAccount::new("thin", dec!(10000)).with_used_margin(dec!(8000)))
            .with_account(PaperAccount::new("healthy", dec!(20000))),
    );
    let dispatcher = OrderDispatcher::new(config(), vec![bind("thin", &venue), bind("healthy", &venue)])
        .with_pacing(PacingWindow::disabled());

    let report = dispatcher.dispatch(&eurusd_buy()).await.unwrap();

    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.submitted_count(), 1);
    match report.outcome("thin") {
        Some(AccountOutcome::Skipped { reasons }) => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].starts_with("margin:"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let spec = config().instrument_spec("paper", "EURUSD").unwrap();
    let expected = PositionSizer::new(dec!(0.01), Default::default())
        .calculate(dec!(20000), dec!(1.0400), dec!(1.0350), &spec, None)
        .unwrap();
    match report.outcome("healthy") {
        Some(AccountOutcome::Submitted { lots, .. }) => {
            assert_eq!(*lots, expected.lots);
            assert_eq!(*lots, dec!(0.4));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let pending = venue.pending("healthy").await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].validity_bars, Some(4));
    assert!(venue.pending("thin").await.is_empty());
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_account(PaperAccount::new("offline", dec!(10000)))
            .with_account(PaperAccount::new("rejecting", dec!(10000)))
            .with_account(PaperAccount::new("ok", dec!(10000))),
    );
    venue
        .fail_on("offline", PaperOp::Context, VenueError::Connectivity("timeout".into()))
        .await;
    venue
        .fail_on(
            "rejecting",
            PaperOp::Submit,
            VenueError::Rejected {
                reason: "market closed".into(),
            },
        )
        .await;

    let accounts = vec![
        bind("offline", &venue),
        bind("rejecting", &venue),
        bind("ok", &venue),
    ];
    let dispatcher = OrderDispatcher::new(config(), accounts).with_pacing(PacingWindow::disabled());
    let report = dispatcher.dispatch(&eurusd_buy()).await.unwrap();

    let ids: Vec<&str> = report.results.iter().map(|r| r.account_id.as_str()).collect();
    assert_eq!(ids, vec!["offline", "rejecting", "ok"]);

    assert_eq!(
        report.outcome("offline"),
        Some(&AccountOutcome::Failed {
            error: DispatchError::Venue(VenueError::Connectivity("timeout".into()))
        })
    );
    assert!(matches!(
        report.outcome("rejecting"),
        Some(AccountOutcome::Failed {
            error: DispatchError::Venue(VenueError::Rejected { .. })
        })
    ));
    assert!(report.outcome("ok").is_some_and(AccountOutcome::is_submitted));
}

#[tokio::test]
async fn test_sizing_error_reported_as_failure() {
    let venue = Arc::new(PaperVenue::new("paper").with_account(PaperAccount::new("acc", dec!(10000))));
    let dispatcher = OrderDispatcher::new(config(), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    let signal = Signal::new("USDTRY", Side::Sell, dec!(32.5000), dec!(32.9000), None);
    let report = dispatcher.dispatch(&signal).await.unwrap();

    assert_eq!(
        report.outcome("acc"),
        Some(&AccountOutcome::Failed {
            error: DispatchError::Sizing(SizingError::MissingConversionRate("TRY".into()))
        })
    );
    assert!(venue.pending("acc").await.is_empty());
}

#[tokio::test]
async fn test_conversion_rate_from_venue() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_price("USDJPY", dec!(125))
            .with_account(PaperAccount::new("acc", dec!(10000))),
    );
    let dispatcher = OrderDispatcher::new(config(), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    // $100 risk over 50 pips at 1000/125 per pip → 0.25 lots
    let signal = Signal::new("USDJPY", Side::Buy, dec!(125.00), dec!(124.50), None);
    let report = dispatcher.dispatch(&signal).await.unwrap();

    match report.outcome("acc") {
        Some(AccountOutcome::Submitted { lots, .. }) => assert_eq!(*lots, dec!(0.25)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_conversion_rate_uses_venue_symbol() {
    let config: Config = toml::from_str(
        r#"
        [general]
        risk_fraction = 0.01

        [instruments.USDJPY]
        pip_size = 0.01
        quote_currency = "JPY"

        [instruments.USDJPY.venues]
        suffixed = "USDJPY.X"
    "#,
    )
    .unwrap();
    let venue = Arc::new(
        PaperVenue::new("suffixed")
            .with_price("USDJPY.X", dec!(125))
            .with_account(PaperAccount::new("acc", dec!(10000))),
    );
    let dispatcher = OrderDispatcher::new(Arc::new(config), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    // The reference pip value of 6.5 would give 0.3 lots
    let signal = Signal::new("USDJPY", Side::Buy, dec!(125.00), dec!(124.50), None);
    let report = dispatcher.dispatch(&signal).await.unwrap();

    match report.outcome("acc") {
        Some(AccountOutcome::Submitted { lots, .. }) => assert_eq!(*lots, dec!(0.25)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(venue.pending("acc").await[0].symbol, "USDJPY");
}

#[tokio::test]
async fn test_unmapped_symbol_uses_venue_instruments() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_instrument(
                signal_fanout::venue::InstrumentSpec::new("XAUUSD", dec!(0.1))
                    .with_quote_currency("USD")
                    .with_pip_value(dec!(10))
                    .with_venue_symbol("GOLD"),
            )
            .with_account(PaperAccount::new("acc", dec!(10000))),
    );
    let dispatcher = OrderDispatcher::new(config(), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    let gold = Signal::new("XAUUSD", Side::Buy, dec!(2300.0), dec!(2290.0), None);
    let report = dispatcher.dispatch(&gold).await.unwrap();
    assert!(report.outcome("acc").is_some_and(AccountOutcome::is_submitted));

    let silver = Signal::new("XAGUSD", Side::Buy, dec!(27.00), dec!(26.50), None);
    let report = dispatcher.dispatch(&silver).await.unwrap();
    match report.outcome("acc") {
        Some(AccountOutcome::Skipped { reasons }) => assert!(reasons[0].starts_with("instrument:")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_signal_skipped() {
    let venue = Arc::new(PaperVenue::new("paper").with_account(PaperAccount::new("acc", dec!(10000))));
    let dispatcher = OrderDispatcher::new(config(), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    let first = dispatcher.dispatch(&eurusd_buy()).await.unwrap();
    let second = dispatcher.dispatch(&eurusd_buy()).await.unwrap();

    assert_eq!(first.submitted_count(), 1);
    match second.outcome("acc") {
        Some(AccountOutcome::Skipped { reasons }) => assert!(reasons[0].starts_with("duplicate:")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(venue.pending("acc").await.len(), 1);
}

#[tokio::test]
async fn test_native_expiry_sets_expiry_instant() {
    let native = Arc::new(
        PaperVenue::new("ctrader")
            .with_native_expiry(true)
            .with_account(PaperAccount::new("ct", dec!(10000))),
    );
    let plain = Arc::new(PaperVenue::new("tradelocker").with_account(PaperAccount::new("tl", dec!(10000))));
    let dispatcher = OrderDispatcher::new(config(), vec![bind("ct", &native), bind("tl", &plain)])
        .with_pacing(PacingWindow::disabled());

    let signal = eurusd_buy().with_validity_bars(2);
    dispatcher.dispatch(&signal).await.unwrap();

    let ct = native.pending("ct").await;
    let expires_at = ct[0].expires_at.expect("native venue order carries expiry");
    assert!(expires_at > ct[0].created_at);
    assert_eq!(ct[0].validity_bars, Some(2));

    let tl = plain.pending("tl").await;
    assert!(tl[0].expires_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pacing_gap_between_submission_starts() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_latency(Duration::from_millis(200))
            .with_account(PaperAccount::new("a1", dec!(10000)))
            .with_account(PaperAccount::new("a2", dec!(10000)))
            .with_account(PaperAccount::new("a3", dec!(10000)))
            .with_account(PaperAccount::new("a4", dec!(10000))),
    );
    let accounts = ["a1", "a2", "a3", "a4"]
        .iter()
        .map(|id| bind(id, &venue))
        .collect();
    let window = PacingWindow::new(500, 3000);
    let dispatcher = OrderDispatcher::new(config(), accounts)
        .with_pacing(window)
        .with_seed(42);

    let started = tokio::time::Instant::now();
    let report = dispatcher.dispatch(&eurusd_buy()).await.unwrap();
    let wall = started.elapsed();

    assert_eq!(report.submitted_count(), 4);

    let submissions = venue.submissions().await;
    let order: Vec<&str> = submissions.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, vec!["a1", "a2", "a3", "a4"]);

    for pair in submissions.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(gap >= Duration::from_millis(500), "gap {gap:?} below minimum");
        assert!(gap <= Duration::from_millis(3010), "gap {gap:?} above maximum");
    }
    assert!(wall <= window.max_delay() * 4, "dispatch took {wall:?}");
}

#[tokio::test(start_paused = true)]
async fn test_pacing_does_not_delay_skips() {
    let venue = Arc::new(
        PaperVenue::new("paper")
            .with_account(PaperAccount::new("busy", dec!(10000)).with_open_positions(9))
            .with_account(PaperAccount::new("ok", dec!(10000))),
    );
    let dispatcher = OrderDispatcher::new(config(), vec![bind("busy", &venue), bind("ok", &venue)])
        .with_pacing(PacingWindow::new(1000, 1000));

    let started = tokio::time::Instant::now();
    let report = dispatcher.dispatch(&eurusd_buy()).await.unwrap();

    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.submitted_count(), 1);
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_invalid_signal_reaches_no_venue() {
    let venue = Arc::new(PaperVenue::new("paper").with_account(PaperAccount::new("acc", dec!(10000))));
    let dispatcher = OrderDispatcher::new(config(), vec![bind("acc", &venue)])
        .with_pacing(PacingWindow::disabled());

    // Stop above entry on a buy
    let signal = Signal::new("EURUSD", Side::Buy, dec!(1.0400), dec!(1.0450), None);
    let err = tokio_test::assert_err!(dispatcher.dispatch(&signal).await);

    assert!(err.to_string().contains("wrong side"));
    assert!(venue.submissions().await.is_empty());
}
