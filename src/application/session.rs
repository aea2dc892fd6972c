//! Trading Session
//!
//! Owns every piece of mutable trading state and runs one
//! analysis-and-trade cycle at a time:
//! - Reconnects to the broker when the handshake has not succeeded yet
//! - Settles finished trades and updates the loss/win streaks
//! - Checks the turbo signal, then the regular signal, on their cadences
//! - Sizes and submits directional signals
//!
//! A session that cannot log in runs in degraded mode: it keeps analyzing
//! and logging but never submits an order. A broker that later forgets the
//! login puts the session back into degraded mode until the next handshake.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::domain::entities::market_state::MarketState;
use crate::domain::entities::risk_state::RiskState;
use crate::domain::entities::signal::Signal;
use crate::domain::entities::trade_record::ActiveTrades;
use crate::domain::errors::{BotError, ErrorSeverity};
use crate::domain::repositories::broker_client::{with_timeout, BrokerClient, Credentials};
use crate::domain::repositories::event_sink::{EventSink, TradeEvent};
use crate::domain::repositories::market_analyst::MarketAnalyst;
use crate::domain::services::ai_signal::{build_analysis_prompt, parse_ai_signal};
use crate::domain::services::indicators::IndicatorBundle;
use crate::domain::services::position_sizer::PositionSizer;
use crate::domain::services::signal_generator::{turbo_candidate, SignalCandidate, SignalGenerator};
use crate::domain::services::trade_executor::{ExecutionOutcome, TradeExecutor};
use crate::domain::services::trade_monitor::poll_outcomes;
use crate::domain::value_objects::symbol_constraints::SymbolConstraints;
use crate::task_runner::{Clock, Scheduler};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Login failed; analysis continues without orders
    Degraded,
    Analyzing,
    Executing,
    Waiting,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Degraded => "degraded",
            SessionState::Analyzing => "analyzing",
            SessionState::Executing => "executing",
            SessionState::Waiting => "waiting",
            SessionState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Read-only view of the session for status logging
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub connected: bool,
    pub risk: RiskState,
    pub market: MarketState,
    pub active_trades: usize,
    pub last_signal: Option<Signal>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

/// Where a candidate came from; only used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalSource {
    Turbo,
    Technical,
    Analyst,
}

pub struct Session {
    config: BotConfig,
    broker: Arc<dyn BrokerClient>,
    credentials: Credentials,
    analyst: Option<Arc<dyn MarketAnalyst>>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    generator: SignalGenerator,
    sizer: PositionSizer,
    executor: TradeExecutor,
    state: SessionState,
    connected: bool,
    risk: RiskState,
    market: MarketState,
    active: ActiveTrades,
    last_trade_at: Option<DateTime<Utc>>,
    last_turbo_at: Option<DateTime<Utc>>,
    last_signal: Option<Signal>,
}

impl Session {
    pub fn new(
        config: BotConfig,
        broker: Arc<dyn BrokerClient>,
        credentials: Credentials,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let generator = SignalGenerator::new(config.profile.clone());
        let sizer = PositionSizer::new(config.risk.clone());
        let executor = TradeExecutor::new(config.executor_config(), broker.clone());

        Self {
            config,
            broker,
            credentials,
            analyst: None,
            sink,
            clock,
            generator,
            sizer,
            executor,
            state: SessionState::Disconnected,
            connected: false,
            risk: RiskState::new(),
            market: MarketState::new(),
            active: ActiveTrades::new(),
            last_trade_at: None,
            last_turbo_at: None,
            last_signal: None,
        }
    }

    /// Consult an analyst on every regular analysis
    pub fn with_analyst(mut self, analyst: Arc<dyn MarketAnalyst>) -> Self {
        self.analyst = Some(analyst);
        self
    }

    /// Start from an existing streak instead of a clean slate
    pub fn with_risk_state(mut self, risk: RiskState) -> Self {
        self.risk = risk;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            connected: self.connected,
            risk: self.risk.clone(),
            market: self.market.clone(),
            active_trades: self.active.len(),
            last_signal: self.last_signal.clone(),
            last_trade_at: self.last_trade_at,
        }
    }

    /// Run cycles on the scheduler's ticks until shutdown is requested
    pub async fn run(&mut self, mut scheduler: Scheduler) {
        info!(
            "Session started: {} {} via {} (profile: {}, every {:?})",
            self.config.symbol,
            self.config.timeframe,
            self.broker.name(),
            self.generator.profile().name,
            scheduler.interval()
        );

        loop {
            if scheduler.is_shutdown() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                self.report(e).await;
            }
            self.log_status();

            if !scheduler.next_tick().await {
                break;
            }
        }

        self.shutdown().await;
    }

    /// Run one full cycle
    ///
    /// # Errors
    /// Any failure of this cycle. The session stays usable; the next cycle
    /// starts over from the connection check.
    pub async fn run_cycle(&mut self) -> Result<(), BotError> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        let now = self.clock.now();

        if !self.connected {
            self.ensure_connected().await;
        }

        if self.connected {
            self.settle_trades(now).await;
        }

        let turbo_due = self.config.turbo_enabled
            && elapsed(self.last_turbo_at, now, self.config.turbo_interval);
        let regular_due = elapsed(self.last_trade_at, now, self.config.trade_frequency);

        if !turbo_due && !regular_due {
            debug!("Nothing due this cycle");
            self.idle();
            return Ok(());
        }

        self.state = SessionState::Analyzing;
        let result = match self.analyze().await {
            Ok(bundle) => {
                self.act_on_due_signals(&bundle, now, turbo_due, regular_due)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(BotError::ConnectionFailure { reason }) = &result {
            let reason = reason.clone();
            self.lose_connection(&reason);
        }
        self.idle();
        result
    }

    /// Release the broker and stop
    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        if self.connected {
            match with_timeout(
                self.config.collaborator_timeout,
                "disconnect",
                self.broker.disconnect(),
            )
            .await
            {
                Ok(()) => info!("Disconnected from {}", self.broker.name()),
                Err(e) => warn!("Disconnect from {} failed: {}", self.broker.name(), e),
            }
        }
        self.connected = false;
        self.state = SessionState::Stopped;
        info!(
            "Session stopped: {} trades, win rate {:.1}%",
            self.risk.total_trades,
            self.risk.win_rate()
        );
    }

    async fn ensure_connected(&mut self) {
        self.state = SessionState::Connecting;
        let result = with_timeout(
            self.config.collaborator_timeout,
            "connect",
            self.broker.connect(&self.credentials),
        )
        .await;

        match result {
            Ok(()) => {
                info!("Connected to {} broker", self.broker.name());
                self.connected = true;
                self.state = SessionState::Connected;
            }
            Err(e) => {
                let error = BotError::ConnectionFailure {
                    reason: e.to_string(),
                };
                warn!("{}; continuing in degraded mode", error);
                self.state = SessionState::Degraded;
            }
        }
    }

    /// Drop the login so the next cycle re-handshakes
    fn lose_connection(&mut self, reason: &str) {
        if self.connected {
            warn!("Broker session lost ({}); reconnecting next cycle", reason);
        }
        self.connected = false;
        self.state = SessionState::Degraded;
    }

    async fn settle_trades(&mut self, now: DateTime<Utc>) {
        if self.active.is_empty() {
            return;
        }
        let poll = poll_outcomes(
            self.broker.as_ref(),
            &mut self.active,
            &mut self.risk,
            now,
            self.config.collaborator_timeout,
        )
        .await;

        if poll.session_lost {
            self.lose_connection("trade outcome check refused");
        }

        for record in poll.closed {
            if let Some(outcome) = record.result {
                self.sink
                    .record(TradeEvent::TradeClosed {
                        order_id: record.id.clone(),
                        outcome,
                        profit: record.profit.unwrap_or_default(),
                        at: now,
                    })
                    .await;
            }
        }
    }

    /// Fetch bars, compute indicators and refresh the market state
    async fn analyze(&mut self) -> Result<IndicatorBundle, BotError> {
        let symbol = self.config.symbol.clone();
        let bars = with_timeout(
            self.config.collaborator_timeout,
            "recent_bars",
            self.broker
                .recent_bars(&symbol, self.config.timeframe, self.config.bar_count),
        )
        .await
        .map_err(|e| {
            BotError::from_broker(e, |e| BotError::data_unavailable(&symbol, e.to_string()))
        })?;

        let bundle = IndicatorBundle::from_bars(&symbol, &bars)?;
        self.market.update(&bundle);
        debug!(
            "{} @ {:.2}: RSI {:.1}, ATR {:.3}, trend {}, momentum {:.3}%",
            symbol,
            bundle.current_price,
            bundle.rsi,
            bundle.atr,
            self.market.trend(),
            self.market.momentum
        );
        Ok(bundle)
    }

    async fn act_on_due_signals(
        &mut self,
        bundle: &IndicatorBundle,
        now: DateTime<Utc>,
        turbo_due: bool,
        regular_due: bool,
    ) -> Result<(), BotError> {
        if turbo_due {
            self.last_turbo_at = Some(now);
            let candidate = turbo_candidate(bundle, &self.market);
            if candidate.is_directional() && self.act(candidate, SignalSource::Turbo, now).await? {
                return Ok(());
            }
        }

        if regular_due {
            let (candidate, source) = self.regular_candidate(bundle).await;
            self.act(candidate, source, now).await?;
        }
        Ok(())
    }

    /// Technical candidate, replaced by the analyst's when it is directional
    async fn regular_candidate(&self, bundle: &IndicatorBundle) -> (SignalCandidate, SignalSource) {
        let technical = self.generator.evaluate(bundle, &self.market);

        let Some(analyst) = &self.analyst else {
            return (technical, SignalSource::Technical);
        };

        let prompt = build_analysis_prompt(
            &self.config.symbol,
            bundle,
            &self.market,
            self.config.ai_min_confidence,
        );
        let reply = tokio::time::timeout(self.config.collaborator_timeout, analyst.analyze(&prompt))
            .await;

        match reply {
            Ok(Ok(text)) => {
                let candidate =
                    parse_ai_signal(&text, bundle.current_price, self.config.ai_min_confidence);
                if candidate.is_directional() {
                    (candidate, SignalSource::Analyst)
                } else {
                    (technical, SignalSource::Technical)
                }
            }
            Ok(Err(e)) => {
                warn!("Analyst unavailable, using technical signal: {}", e);
                (technical, SignalSource::Technical)
            }
            Err(_) => {
                warn!("Analyst timed out, using technical signal");
                (technical, SignalSource::Technical)
            }
        }
    }

    /// Size and execute a candidate
    ///
    /// # Returns
    /// `true` when an order was placed
    async fn act(
        &mut self,
        candidate: SignalCandidate,
        source: SignalSource,
        now: DateTime<Utc>,
    ) -> Result<bool, BotError> {
        if !candidate.is_directional() {
            debug!("{:?}: {}", source, candidate.reason);
            self.last_signal = Some(candidate.into_signal(0.0));
            self.state = SessionState::Waiting;
            return Ok(false);
        }

        let volume = self
            .size(candidate.stop_loss, candidate.entry_price)
            .await;
        let signal = candidate.into_signal(volume);
        self.last_signal = Some(signal.clone());

        if !signal.is_actionable() {
            self.state = SessionState::Waiting;
            return Ok(false);
        }

        info!(
            "{:?} signal: {} {:.2} lots, confidence {:.0}% ({})",
            source,
            signal.direction(),
            signal.lot_size(),
            signal.confidence(),
            signal.reason()
        );

        if !self.connected {
            info!("Degraded mode: {} signal not executed", signal.direction());
            self.state = SessionState::Waiting;
            return Ok(false);
        }

        self.state = SessionState::Executing;
        match self.executor.execute(&signal, &mut self.risk, now).await? {
            ExecutionOutcome::Executed(record) => {
                self.sink
                    .record(TradeEvent::TradeOpened {
                        order_id: record.id.clone(),
                        symbol: self.config.symbol.clone(),
                        direction: signal.direction(),
                        volume: record.volume,
                        price: record.fill_price,
                        confidence: signal.confidence(),
                        at: now,
                    })
                    .await;
                self.active.insert(record);
                self.last_trade_at = Some(now);
                Ok(true)
            }
            ExecutionOutcome::Skipped(reason) => {
                info!("Order skipped: {}", reason);
                Ok(false)
            }
        }
    }

    /// Volume for a stop distance, falling back to the platform minimum
    async fn size(&mut self, stop_loss: f64, entry_price: f64) -> f64 {
        let balance = if self.connected {
            self.fetch_balance().await
        } else {
            None
        };
        let constraints = if self.connected {
            self.fetch_constraints().await
        } else {
            None
        };

        let decision = self.sizer.size_position(
            stop_loss,
            entry_price,
            balance,
            &self.risk,
            constraints.as_ref(),
        );

        if decision.fallback {
            let error = BotError::SizingFallback {
                volume: decision.volume,
                reason: "balance or symbol constraints unavailable".to_string(),
            };
            warn!("[{}] {}", error.severity(), error);
        }
        self.risk.current_multiplier = decision.multiplier;
        decision.volume
    }

    async fn fetch_balance(&mut self) -> Option<f64> {
        match with_timeout(
            self.config.collaborator_timeout,
            "account_info",
            self.broker.account_info(),
        )
        .await
        {
            Ok(info) => Some(info.balance),
            Err(e) if e.is_session_lost() => {
                self.lose_connection(&e.to_string());
                None
            }
            Err(e) => {
                warn!("Account info unavailable: {}", e);
                None
            }
        }
    }

    async fn fetch_constraints(&mut self) -> Option<SymbolConstraints> {
        match with_timeout(
            self.config.collaborator_timeout,
            "symbol_constraints",
            self.broker.symbol_constraints(&self.config.symbol),
        )
        .await
        {
            Ok(constraints) => Some(constraints),
            Err(e) if e.is_session_lost() => {
                self.lose_connection(&e.to_string());
                None
            }
            Err(e) => {
                warn!("Symbol constraints unavailable for {}: {}", self.config.symbol, e);
                None
            }
        }
    }

    fn idle(&mut self) {
        self.state = if self.connected {
            SessionState::Connected
        } else {
            SessionState::Degraded
        };
    }

    async fn report(&self, error: BotError) {
        match error.severity() {
            ErrorSeverity::Critical => {
                error!("[{}] {}: {}", error.severity(), error.error_code(), error)
            }
            _ => warn!("[{}] {}: {}", error.severity(), error.error_code(), error),
        }
        self.sink
            .record(TradeEvent::CycleError {
                code: error.error_code().to_string(),
                severity: error.severity().to_string(),
                message: error.to_string(),
                at: self.clock.now(),
            })
            .await;
    }

    fn log_status(&self) {
        info!(
            "[{}] trades {} | W{} L{} | x{:.2} | active {}",
            self.state,
            self.risk.total_trades,
            self.risk.consecutive_wins,
            self.risk.consecutive_losses,
            self.risk.current_multiplier,
            self.active.len()
        );
    }
}

fn elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => (now - last).to_std().map(|d| d >= interval).unwrap_or(false),
    }
}
