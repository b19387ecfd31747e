//! Signal fan-out across accounts
//!
//! Every enabled account is evaluated on its own task (context fetch, filters,
//! sizing). Submissions then start in configured order, each one gated by the
//! pacer, and run without waiting for the previous one to finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{AccountOutcome, AccountResult, DispatchError, DispatchReport, Pacer, PacingWindow};
use crate::calendar::{CalendarResolver, CandleAligner};
use crate::config::Config;
use crate::risk::{FilterEngine, PositionSizer};
use crate::signal::{Signal, SignalError};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use crate::venue::{AccountBinding, InstrumentSpec, OrderRequest};

const LABEL_SYMBOL_CHARS: usize = 8;

/// Result of evaluating one account
enum Evaluation {
    Ready(Box<OrderRequest>),
    Done(AccountOutcome),
}

/// Read-only state shared by account tasks
struct Evaluator {
    config: Arc<Config>,
    sizer: PositionSizer,
    filters: FilterEngine,
    calendars: CalendarResolver,
}

impl Evaluator {
    async fn evaluate(&self, binding: &AccountBinding, signal: &Signal) -> Evaluation {
        let started = Instant::now();
        let evaluation = match self.prepare(binding, signal).await {
            Ok(evaluation) => evaluation,
            Err(error) => Evaluation::Done(AccountOutcome::Failed { error }),
        };
        telemetry::record_latency(LatencyMetric::AccountEvaluation, started.elapsed());
        evaluation
    }

    async fn prepare(
        &self,
        binding: &AccountBinding,
        signal: &Signal,
    ) -> Result<Evaluation, DispatchError> {
        let account_id = binding.account_id.as_str();
        let venue = &binding.venue;

        let ctx = venue.get_account_context(account_id).await?;
        let spec = self.resolve_instrument(binding, &signal.symbol).await?;

        let verdict = self.filters.evaluate(&ctx, &signal.symbol, spec.as_ref());
        let Some(spec) = spec.filter(|_| verdict.is_allowed()) else {
            let reasons = verdict.reasons();
            tracing::info!(
                account = account_id,
                venue = venue.venue_id(),
                symbol = %signal.symbol,
                reason = reasons.first().map(String::as_str).unwrap_or_default(),
                "Account skipped by filters"
            );
            return Ok(Evaluation::Done(AccountOutcome::Skipped { reasons }));
        };

        let conversion_rate = self.conversion_rate(binding, &spec).await;
        let size = self
            .sizer
            .size_for_account(&ctx, signal.entry, signal.stop, &spec, conversion_rate)?;

        let validity_bars = signal
            .validity_bars
            .unwrap_or(self.config.general.default_validity_bars);
        let expires_at = venue.supports_native_expiry().then(|| {
            let aligner = CandleAligner::new(self.calendars.resolve(&signal.symbol));
            aligner.expiry_instant(Utc::now(), validity_bars)
        });

        tracing::debug!(
            account = account_id,
            symbol = %signal.symbol,
            lots = %size.lots,
            risk = %size.actual_risk,
            ?expires_at,
            "Account ready for submission"
        );

        Ok(Evaluation::Ready(Box::new(OrderRequest {
            symbol: signal.symbol.clone(),
            venue_symbol: spec.venue_symbol.clone(),
            side: signal.side,
            entry: signal.entry,
            stop: signal.stop,
            target: signal.target,
            lots: size.lots,
            validity_bars,
            expires_at,
            label: order_label(&signal.symbol),
            comment: format!("{} {}", signal.timeframe, signal.side),
        })))
    }

    /// Configured mapping first, then the venue's own instrument list
    async fn resolve_instrument(
        &self,
        binding: &AccountBinding,
        symbol: &str,
    ) -> Result<Option<InstrumentSpec>, DispatchError> {
        if let Some(spec) = self.config.instrument_spec(binding.venue_id(), symbol) {
            return Ok(Some(spec));
        }
        let instruments = binding.venue.list_instruments(&binding.account_id).await?;
        Ok(instruments.into_iter().find(|i| i.symbol == symbol))
    }

    async fn conversion_rate(
        &self,
        binding: &AccountBinding,
        spec: &InstrumentSpec,
    ) -> Option<Decimal> {
        let pair = spec.conversion_pair()?;
        let venue_pair = self
            .config
            .instrument_spec(binding.venue_id(), &pair)
            .map_or_else(|| pair.clone(), |spec| spec.venue_symbol);
        match binding.venue.get_price(&binding.account_id, &venue_pair).await {
            Ok(price) => Some(spec.usd_quote_rate(price)),
            Err(e) => {
                tracing::warn!(
                    account = %binding.account_id,
                    pair = %pair,
                    venue_pair = %venue_pair,
                    error = %e,
                    "Conversion rate unavailable"
                );
                None
            }
        }
    }
}

/// Short order label carried to the venue
pub fn order_label(symbol: &str) -> String {
    let short: String = symbol.chars().take(LABEL_SYMBOL_CHARS).collect();
    format!("SIG-{short}")
}

/// Fans one signal out to every enabled account
pub struct OrderDispatcher {
    accounts: Vec<AccountBinding>,
    evaluator: Arc<Evaluator>,
    pacing: PacingWindow,
    seed: Option<u64>,
}

impl OrderDispatcher {
    /// Create a dispatcher over accounts in configured order
    pub fn new(config: Arc<Config>, accounts: Vec<AccountBinding>) -> Self {
        let evaluator = Evaluator {
            sizer: PositionSizer::from_config(&config.general),
            filters: FilterEngine::new(config.filters.clone()),
            calendars: config.calendar_resolver(),
            config: Arc::clone(&config),
        };
        Self {
            accounts,
            pacing: config.pacing,
            evaluator: Arc::new(evaluator),
            seed: None,
        }
    }

    /// Override the pacing window
    pub fn with_pacing(mut self, pacing: PacingWindow) -> Self {
        self.pacing = pacing;
        self
    }

    /// Seed pacing jitter for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Dispatch a signal to every enabled account
    ///
    /// Fails only when the signal itself is invalid; per-account errors are
    /// reported as outcomes.
    pub async fn dispatch(&self, signal: &Signal) -> Result<DispatchReport, SignalError> {
        signal.validate()?;

        let started_at = Utc::now();
        let started = Instant::now();
        let enabled: Vec<&AccountBinding> = self.accounts.iter().filter(|a| a.enabled).collect();
        let signal = Arc::new(signal.clone());

        tracing::info!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            side = %signal.side,
            entry = %signal.entry,
            stop = %signal.stop,
            accounts = enabled.len(),
            "Dispatching signal"
        );
        telemetry::increment(CounterMetric::SignalsDispatched);

        let evaluations: Vec<JoinHandle<Evaluation>> = enabled
            .iter()
            .map(|binding| {
                let evaluator = Arc::clone(&self.evaluator);
                let binding = (*binding).clone();
                let signal = Arc::clone(&signal);
                tokio::spawn(async move { evaluator.evaluate(&binding, &signal).await })
            })
            .collect();

        let mut pacer = match self.seed {
            Some(seed) => Pacer::with_seed(self.pacing, seed),
            None => Pacer::new(self.pacing),
        };

        let mut pending: Vec<JoinHandle<(AccountOutcome, Duration)>> =
            Vec::with_capacity(enabled.len());
        for (binding, handle) in enabled.iter().zip(evaluations) {
            let evaluation = handle.await.unwrap_or_else(|e| {
                Evaluation::Done(AccountOutcome::Failed {
                    error: DispatchError::Task(e.to_string()),
                })
            });

            let task = match evaluation {
                Evaluation::Done(outcome) => {
                    let elapsed = started.elapsed();
                    tokio::spawn(async move { (outcome, elapsed) })
                }
                Evaluation::Ready(request) => {
                    let waited = pacer.wait_turn().await;
                    if !waited.is_zero() {
                        tracing::debug!(
                            account = %binding.account_id,
                            waited_ms = waited.as_millis() as u64,
                            "Pacing delay before submission"
                        );
                    }
                    let binding = (*binding).clone();
                    tokio::spawn(async move {
                        let outcome = submit(&binding, &request).await;
                        (outcome, started.elapsed())
                    })
                }
            };
            pending.push(task);
        }

        let results = join_all(pending)
            .await
            .into_iter()
            .zip(enabled.iter())
            .map(|(joined, binding)| {
                let (outcome, elapsed) = joined.unwrap_or_else(|e| {
                    (
                        AccountOutcome::Failed {
                            error: DispatchError::Task(e.to_string()),
                        },
                        started.elapsed(),
                    )
                });
                record_outcome(&outcome);
                AccountResult {
                    account_id: binding.account_id.clone(),
                    venue_id: binding.venue_id().to_string(),
                    outcome,
                    elapsed,
                }
            })
            .collect();

        let report = DispatchReport {
            signal_id: signal.id,
            symbol: signal.symbol.clone(),
            started_at,
            elapsed: started.elapsed(),
            results,
        };
        telemetry::record_latency(LatencyMetric::Dispatch, report.elapsed);

        tracing::info!(
            signal_id = %report.signal_id,
            submitted = report.submitted_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Dispatch complete"
        );
        Ok(report)
    }
}

async fn submit(binding: &AccountBinding, request: &OrderRequest) -> AccountOutcome {
    let started = Instant::now();
    let result = binding
        .venue
        .submit_limit_order(&binding.account_id, request)
        .await;
    telemetry::record_latency(LatencyMetric::OrderSubmission, started.elapsed());

    match result {
        Ok(order) => {
            tracing::info!(
                account = %binding.account_id,
                venue = binding.venue_id(),
                order_id = %order.order_id,
                symbol = %request.symbol,
                lots = %request.lots,
                "Order submitted"
            );
            AccountOutcome::Submitted {
                order_id: order.order_id,
                lots: request.lots,
            }
        }
        Err(e) => {
            tracing::warn!(
                account = %binding.account_id,
                venue = binding.venue_id(),
                error = %e,
                transient = e.is_transient(),
                "Order submission failed"
            );
            AccountOutcome::Failed { error: e.into() }
        }
    }
}

fn record_outcome(outcome: &AccountOutcome) {
    let metric = match outcome {
        AccountOutcome::Submitted { .. } => CounterMetric::AccountSubmitted,
        AccountOutcome::Skipped { .. } => CounterMetric::AccountSkipped,
        AccountOutcome::Failed { .. } => CounterMetric::AccountFailed,
    };
    telemetry::increment(metric);
}
