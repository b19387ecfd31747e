//! Paper venue with in-memory accounts

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountContext, CancelOutcome, InstrumentSpec, OrderRequest, PendingOrder, VenueAdapter,
    VenueError,
};

/// Account state held by a paper venue
#[derive(Debug, Clone)]
pub struct PaperAccount {
    /// Account identifier
    pub account_id: String,
    /// Equity
    pub equity: Decimal,
    /// Balance
    pub balance: Decimal,
    /// Margin in use
    pub used_margin: Decimal,
    /// Daily drawdown consumed, percent
    pub daily_drawdown_pct: Decimal,
    /// Open positions
    pub open_positions: usize,
}

impl PaperAccount {
    /// Flat account with no margin in use
    pub fn new(account_id: impl Into<String>, equity: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            equity,
            balance: equity,
            used_margin: Decimal::ZERO,
            daily_drawdown_pct: Decimal::ZERO,
            open_positions: 0,
        }
    }

    /// Set margin in use
    pub fn with_used_margin(mut self, used_margin: Decimal) -> Self {
        self.used_margin = used_margin;
        self
    }

    /// Set daily drawdown consumed
    pub fn with_drawdown(mut self, pct: Decimal) -> Self {
        self.daily_drawdown_pct = pct;
        self
    }

    /// Set open position count
    pub fn with_open_positions(mut self, count: usize) -> Self {
        self.open_positions = count;
        self
    }
}

/// Operations that can be made to fail on a paper venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperOp {
    /// `get_account_context`
    Context,
    /// `submit_limit_order`
    Submit,
    /// `list_pending_orders`
    List,
    /// `cancel_order`
    Cancel,
}

#[derive(Debug, Default)]
struct PaperState {
    accounts: HashMap<String, PaperAccount>,
    pending: HashMap<String, Vec<PendingOrder>>,
    failures: HashMap<(String, PaperOp), VenueError>,
    submissions: Vec<(String, tokio::time::Instant)>,
    cancels: Vec<(String, String)>,
}

/// In-memory venue used for dry runs and tests
pub struct PaperVenue {
    venue_id: String,
    native_expiry: bool,
    latency: Duration,
    instruments: Vec<InstrumentSpec>,
    prices: HashMap<String, Decimal>,
    state: RwLock<PaperState>,
}

impl PaperVenue {
    /// Create an empty paper venue
    pub fn new(venue_id: impl Into<String>) -> Self {
        Self {
            venue_id: venue_id.into(),
            native_expiry: false,
            latency: Duration::ZERO,
            instruments: vec![],
            prices: HashMap::new(),
            state: RwLock::new(PaperState::default()),
        }
    }

    /// Declare native expiry support
    pub fn with_native_expiry(mut self, native_expiry: bool) -> Self {
        self.native_expiry = native_expiry;
        self
    }

    /// Simulated network latency for every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Offer an instrument
    pub fn with_instrument(mut self, spec: InstrumentSpec) -> Self {
        self.instruments.push(spec);
        self
    }

    /// Quote a symbol
    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }

    /// Open an account
    pub fn with_account(mut self, account: PaperAccount) -> Self {
        let state = self.state.get_mut();
        state.pending.entry(account.account_id.clone()).or_default();
        state.accounts.insert(account.account_id.clone(), account);
        self
    }

    /// Make an operation fail for one account
    pub async fn fail_on(&self, account_id: &str, op: PaperOp, error: VenueError) {
        let mut state = self.state.write().await;
        state.failures.insert((account_id.to_string(), op), error);
    }

    /// Place an order directly into the book, bypassing submission
    pub async fn insert_pending(&self, order: PendingOrder) {
        let mut state = self.state.write().await;
        state
            .pending
            .entry(order.account_id.clone())
            .or_default()
            .push(order);
    }

    /// Remove an order as if it had triggered
    pub async fn trigger(&self, account_id: &str, order_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(orders) = state.pending.get_mut(account_id) else {
            return false;
        };
        let before = orders.len();
        orders.retain(|o| o.order_id != order_id);
        before != orders.len()
    }

    /// Pending orders currently held for an account
    pub async fn pending(&self, account_id: &str) -> Vec<PendingOrder> {
        let state = self.state.read().await;
        state.pending.get(account_id).cloned().unwrap_or_default()
    }

    /// Accounts and start instants of every submission, in order
    pub async fn submissions(&self) -> Vec<(String, tokio::time::Instant)> {
        self.state.read().await.submissions.clone()
    }

    /// Successful cancels as (account, order id)
    pub async fn cancels(&self) -> Vec<(String, String)> {
        self.state.read().await.cancels.clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_failure(
        state: &PaperState,
        account_id: &str,
        op: PaperOp,
    ) -> Result<(), VenueError> {
        match state.failures.get(&(account_id.to_string(), op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn unknown_account(account_id: &str) -> VenueError {
        VenueError::NotFound(format!("account {account_id}"))
    }
}

#[async_trait]
impl VenueAdapter for PaperVenue {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    fn supports_native_expiry(&self) -> bool {
        self.native_expiry
    }

    async fn get_account_context(&self, account_id: &str) -> Result<AccountContext, VenueError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Self::check_failure(&state, account_id, PaperOp::Context)?;

        let account = state
            .accounts
            .get(account_id)
            .ok_or_else(|| Self::unknown_account(account_id))?;
        let pending = state.pending.get(account_id).map(Vec::as_slice).unwrap_or(&[]);

        Ok(AccountContext {
            venue_id: self.venue_id.clone(),
            account_id: account.account_id.clone(),
            equity: account.equity,
            balance: account.balance,
            used_margin: account.used_margin,
            free_margin: account.equity - account.used_margin,
            daily_drawdown_pct: account.daily_drawdown_pct,
            open_positions: account.open_positions,
            pending_orders: pending.len(),
            pending_symbols: pending.iter().map(|o| o.symbol.clone()).collect::<HashSet<_>>(),
        })
    }

    async fn list_instruments(&self, account_id: &str) -> Result<Vec<InstrumentSpec>, VenueError> {
        let state = self.state.read().await;
        if !state.accounts.contains_key(account_id) {
            return Err(Self::unknown_account(account_id));
        }
        Ok(self.instruments.clone())
    }

    async fn get_price(&self, _account_id: &str, symbol: &str) -> Result<Decimal, VenueError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| VenueError::NotFound(format!("price for {symbol}")))
    }

    async fn submit_limit_order(
        &self,
        account_id: &str,
        request: &OrderRequest,
    ) -> Result<PendingOrder, VenueError> {
        let started = tokio::time::Instant::now();
        {
            let mut state = self.state.write().await;
            state.submissions.push((account_id.to_string(), started));
        }
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        Self::check_failure(&state, account_id, PaperOp::Submit)?;
        if !state.accounts.contains_key(account_id) {
            return Err(Self::unknown_account(account_id));
        }
        if request.lots <= Decimal::ZERO {
            return Err(VenueError::Rejected {
                reason: format!("invalid volume {}", request.lots),
            });
        }
        if request.entry <= Decimal::ZERO {
            return Err(VenueError::Rejected {
                reason: format!("invalid price {}", request.entry),
            });
        }

        let order = PendingOrder {
            order_id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            created_at: Utc::now(),
            validity_bars: Some(request.validity_bars),
            profile: None,
            entry: request.entry,
            stop: request.stop,
            target: request.target,
            lots: request.lots,
            expires_at: request.expires_at.filter(|_| self.native_expiry),
        };
        state
            .pending
            .entry(account_id.to_string())
            .or_default()
            .push(order.clone());

        tracing::info!(
            venue = %self.venue_id,
            account = account_id,
            order_id = %order.order_id,
            symbol = %order.symbol,
            lots = %order.lots,
            "Paper order placed"
        );
        Ok(order)
    }

    async fn list_pending_orders(&self, account_id: &str) -> Result<Vec<PendingOrder>, VenueError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        Self::check_failure(&state, account_id, PaperOp::List)?;
        if !state.accounts.contains_key(account_id) {
            return Err(Self::unknown_account(account_id));
        }

        let orders = state.pending.entry(account_id.to_string()).or_default();
        if self.native_expiry {
            let now = Utc::now();
            orders.retain(|o| o.expires_at.map_or(true, |at| at > now));
        }
        Ok(orders.clone())
    }

    async fn cancel_order(
        &self,
        account_id: &str,
        order_id: &str,
    ) -> Result<CancelOutcome, VenueError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        Self::check_failure(&state, account_id, PaperOp::Cancel)?;

        let Some(orders) = state.pending.get_mut(account_id) else {
            return Ok(CancelOutcome::NotFound);
        };
        let before = orders.len();
        orders.retain(|o| o.order_id != order_id);
        if before == orders.len() {
            return Ok(CancelOutcome::NotFound);
        }

        state
            .cancels
            .push((account_id.to_string(), order_id.to_string()));
        tracing::info!(venue = %self.venue_id, account = account_id, order_id, "Paper order cancelled");
        Ok(CancelOutcome::Cancelled)
    }
}
