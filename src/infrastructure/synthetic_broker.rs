//! Deterministic in-process broker
//!
//! Generates a seeded random-walk bar history around a mid price, accepts
//! every valid order, and settles trades either from a script or randomly at a
//! configured win rate. Used when no live terminal is configured and by tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::entities::order::OrderRequest;
use crate::domain::entities::trade_record::TradeOutcome;
use crate::domain::repositories::broker_client::{
    AccountInfo, BrokerClient, BrokerError, BrokerResult, Credentials, OrderAck, Quote, Timeframe,
    RETCODE_DONE,
};
use crate::domain::services::indicators::PriceBar;
use crate::domain::value_objects::symbol_constraints::SymbolConstraints;

pub const SYNTHETIC_BASE_PRICE: f64 = 2000.0;
pub const SYNTHETIC_BALANCE: f64 = 10_000.0;
const FIRST_ORDER_ID: u64 = 100_000;

struct State {
    rng: StdRng,
    mid: f64,
    spread: f64,
    balance: f64,
    constraints: SymbolConstraints,
    scripted_bars: Option<Vec<PriceBar>>,
    next_order_id: u64,
    submitted: Vec<OrderRequest>,
    open: HashSet<String>,
    scripted_outcomes: HashMap<String, f64>,
    auto_win_rate: Option<f64>,
    fail_connect: bool,
    fail_constraints: bool,
    fail_account: bool,
    fail_bars: bool,
    reject_orders: bool,
    session_dropped: bool,
    connect_attempts: usize,
    connected: bool,
}

/// Seeded synthetic broker
pub struct SyntheticBroker {
    state: Mutex<State>,
}

impl SyntheticBroker {
    pub fn new(seed: u64) -> Self {
        let constraints = SymbolConstraints::default();
        Self {
            state: Mutex::new(State {
                rng: StdRng::seed_from_u64(seed),
                mid: SYNTHETIC_BASE_PRICE,
                spread: constraints.spread,
                balance: SYNTHETIC_BALANCE,
                constraints,
                scripted_bars: None,
                next_order_id: FIRST_ORDER_ID,
                submitted: Vec::new(),
                open: HashSet::new(),
                scripted_outcomes: HashMap::new(),
                auto_win_rate: None,
                fail_connect: false,
                fail_constraints: false,
                fail_account: false,
                fail_bars: false,
                reject_orders: false,
                session_dropped: false,
                connect_attempts: 0,
                connected: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settle open trades randomly on their first outcome poll
    pub fn with_auto_settle(self, win_rate: f64) -> Self {
        self.state().auto_win_rate = Some(win_rate.clamp(0.0, 1.0));
        self
    }

    /// Serve these bars instead of the random walk; the quote follows the last close
    pub fn with_bars(self, bars: Vec<PriceBar>) -> Self {
        self.set_bars(bars);
        self
    }

    pub fn set_bars(&self, bars: Vec<PriceBar>) {
        let mut state = self.state();
        if let Some(last) = bars.last() {
            state.mid = last.close;
        }
        state.scripted_bars = Some(bars);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    pub fn fail_constraints(&self, fail: bool) {
        self.state().fail_constraints = fail;
    }

    pub fn fail_account(&self, fail: bool) {
        self.state().fail_account = fail;
    }

    pub fn fail_bars(&self, fail: bool) {
        self.state().fail_bars = fail;
    }

    pub fn reject_orders(&self, reject: bool) {
        self.state().reject_orders = reject;
    }

    /// Forget the login: every call fails with `NotConnected` until the
    /// next successful `connect`
    pub fn drop_session(&self) {
        let mut state = self.state();
        state.session_dropped = true;
        state.connected = false;
    }

    /// Number of handshakes attempted so far
    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    /// Script the realized profit for an order id
    pub fn settle(&self, order_id: &str, profit: f64) {
        self.state().scripted_outcomes.insert(order_id.to_string(), profit);
    }

    pub fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state().submitted.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn require_session(state: &State) -> BrokerResult<()> {
        if state.session_dropped {
            Err(BrokerError::NotConnected)
        } else {
            Ok(())
        }
    }

    fn random_walk(state: &mut State, timeframe: Timeframe, count: usize) -> Vec<PriceBar> {
        let step = ChronoDuration::minutes(timeframe.minutes());
        let end = Utc::now();

        // Walk backwards from the mid so the newest close equals the quote
        let mut closes = Vec::with_capacity(count);
        let mut price = state.mid;
        for _ in 0..count {
            closes.push(price);
            price = (price - state.rng.gen_range(-1.0..1.0)).max(1.0);
        }
        closes.reverse();

        let mut bars = Vec::with_capacity(count);
        let mut previous = closes.first().copied().unwrap_or(state.mid);
        for (i, close) in closes.into_iter().enumerate() {
            let open = previous;
            let wick = state.rng.gen_range(0.0..0.5);
            let high = open.max(close) + wick;
            let low = (open.min(close) - wick).max(0.0);
            let volume = state.rng.gen_range(100.0..1000.0_f64).round();
            let time = end - step * (count - i) as i32;
            if let Ok(bar) = PriceBar::new(time, open, high, low, close, volume) {
                bars.push(bar);
            }
            previous = close;
        }
        bars
    }
}

#[async_trait]
impl BrokerClient for SyntheticBroker {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn connect(&self, credentials: &Credentials) -> BrokerResult<()> {
        let mut state = self.state();
        state.connect_attempts += 1;
        if state.fail_connect {
            return Err(BrokerError::AuthenticationError(format!(
                "login {} refused",
                credentials.login
            )));
        }
        state.connected = true;
        state.session_dropped = false;
        tracing::info!("Synthetic broker session opened for {}", credentials.login);
        Ok(())
    }

    async fn symbol_constraints(&self, symbol: &str) -> BrokerResult<SymbolConstraints> {
        let state = self.state();
        Self::require_session(&state)?;
        if state.fail_constraints {
            return Err(BrokerError::DataUnavailable(format!("no symbol info for {}", symbol)));
        }
        Ok(state.constraints)
    }

    async fn quote(&self, _symbol: &str) -> BrokerResult<Quote> {
        let state = self.state();
        Self::require_session(&state)?;
        let half = state.spread / 2.0;
        Ok(Quote {
            bid: state.mid - half,
            ask: state.mid + half,
        })
    }

    async fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> BrokerResult<Vec<PriceBar>> {
        let mut state = self.state();
        Self::require_session(&state)?;
        if state.fail_bars {
            return Err(BrokerError::DataUnavailable(format!("no rates for {}", symbol)));
        }
        if let Some(bars) = &state.scripted_bars {
            let start = bars.len().saturating_sub(count);
            return Ok(bars[start..].to_vec());
        }
        Ok(Self::random_walk(&mut state, timeframe, count))
    }

    async fn submit_order(&self, request: &OrderRequest) -> BrokerResult<OrderAck> {
        let mut state = self.state();
        Self::require_session(&state)?;
        if state.reject_orders {
            return Ok(OrderAck {
                accepted: false,
                order_id: String::new(),
                retcode: 10006,
                message: "Request rejected".to_string(),
            });
        }
        if !state.constraints.contains(request.volume) {
            return Err(BrokerError::OrderRejected {
                retcode: 10014,
                message: format!("invalid volume {}", request.volume),
            });
        }

        let order_id = state.next_order_id.to_string();
        state.next_order_id += 1;
        state.submitted.push(request.clone());
        state.open.insert(order_id.clone());

        Ok(OrderAck {
            accepted: true,
            order_id,
            retcode: RETCODE_DONE,
            message: "Request executed".to_string(),
        })
    }

    async fn open_positions(&self, _symbol: &str) -> BrokerResult<usize> {
        let state = self.state();
        Self::require_session(&state)?;
        Ok(state.open.len())
    }

    async fn account_info(&self) -> BrokerResult<AccountInfo> {
        let state = self.state();
        Self::require_session(&state)?;
        if state.fail_account {
            return Err(BrokerError::DataUnavailable("account info".to_string()));
        }
        Ok(AccountInfo {
            balance: state.balance,
            equity: state.balance,
        })
    }

    async fn trade_outcome(&self, order_id: &str) -> BrokerResult<Option<(TradeOutcome, f64)>> {
        let mut state = self.state();
        Self::require_session(&state)?;

        let profit = if let Some(profit) = state.scripted_outcomes.remove(order_id) {
            profit
        } else if let (Some(win_rate), true) = (state.auto_win_rate, state.open.contains(order_id)) {
            let magnitude = state.rng.gen_range(5.0..50.0_f64);
            if state.rng.gen_bool(win_rate) {
                magnitude
            } else {
                -magnitude
            }
        } else {
            return Ok(None);
        };

        state.open.remove(order_id);
        state.balance += profit;
        Ok(Some((TradeOutcome::from_profit(profit), profit)))
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        self.state().connected = false;
        tracing::info!("Synthetic broker session closed");
        Ok(())
    }
}
