use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use goldex::application::session::{Session, SessionState};
use goldex::config::BotConfig;
use goldex::domain::entities::risk_state::RiskState;
use goldex::domain::entities::signal::Direction;
use goldex::domain::entities::trade_record::TradeOutcome;
use goldex::domain::repositories::broker_client::Credentials;
use goldex::domain::repositories::event_sink::{EventSink, TradeEvent};
use goldex::domain::repositories::market_analyst::{AnalystError, MarketAnalyst};
use goldex::domain::services::indicators::{IndicatorBundle, PriceBar};
use goldex::domain::services::signal_generator::SignalGenerator;
use goldex::infrastructure::synthetic_broker::SyntheticBroker;
use goldex::task_runner::{Clock, ManualClock, Scheduler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn flat_bars(count: usize, price: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let time = start() - ChronoDuration::minutes(15 * (count - i) as i64);
            PriceBar::new(time, price, price, price, price, 100.0).unwrap()
        })
        .collect()
}

/// 60 bars closing from 1950 up to 2050 in equal steps
fn rising_bars() -> Vec<PriceBar> {
    let count = 60;
    let mut previous = 1950.0;
    (0..count)
        .map(|i| {
            let close = 1950.0 + i as f64 * 100.0 / 59.0;
            let open = previous;
            previous = close;
            let time = start() - ChronoDuration::minutes(15 * (count - i) as i64);
            PriceBar::new(time, open, open.max(close) + 0.5, open.min(close) - 0.5, close, 100.0)
                .unwrap()
        })
        .collect()
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<TradeEvent>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn record(&self, event: TradeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct ScriptedAnalyst {
    reply: Result<String, AnalystError>,
}

#[async_trait]
impl MarketAnalyst for ScriptedAnalyst {
    async fn analyze(&self, _prompt: &str) -> Result<String, AnalystError> {
        self.reply.clone()
    }
}

struct Harness {
    broker: Arc<SyntheticBroker>,
    sink: Arc<RecordingSink>,
    clock: ManualClock,
    session: Session,
}

fn harness(config: BotConfig, bars: Vec<PriceBar>) -> Harness {
    let broker = Arc::new(SyntheticBroker::new(11).with_bars(bars));
    let sink = Arc::new(RecordingSink::default());
    let clock = ManualClock::new(start());
    let session = Session::new(
        config,
        broker.clone(),
        Credentials::new(5550123, "secret".to_string(), "Demo".to_string()),
        sink.clone(),
        Arc::new(clock.clone()),
    );
    Harness {
        broker,
        sink,
        clock,
        session,
    }
}

#[tokio::test]
async fn test_flat_market_produces_no_signal() {
    let mut h = harness(BotConfig::conservative(), flat_bars(60, 2000.0));

    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    let signal = snapshot.last_signal.expect("a signal is always recorded");
    assert_eq!(signal.direction(), Direction::None);
    assert_eq!(signal.lot_size(), 0.0);
    assert_eq!(signal.reason(), "No signal");
    assert!(snapshot.market.in_range());
    assert_eq!(snapshot.risk.current_multiplier, 1.0);
    assert!(h.broker.submitted_orders().is_empty());
}

#[tokio::test]
async fn test_rising_market_conservative_stays_out() {
    let config = BotConfig::conservative();
    let generator = SignalGenerator::new(config.profile.clone());
    let mut h = harness(config, rising_bars());

    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    assert!(snapshot.market.in_uptrend());

    // Overbought RSI 30 + volatility 10 against trend 25 + volatility 10;
    // neither side reaches the 50 threshold
    let bundle = IndicatorBundle::from_bars("XAUUSD", &rising_bars()).unwrap();
    let scores = generator.score(&bundle, &snapshot.market);
    assert_eq!(scores.bullish, 35.0);
    assert_eq!(scores.bearish, 40.0);
    assert_eq!(
        snapshot.last_signal.map(|s| s.direction()),
        Some(Direction::None)
    );
    assert!(h.broker.submitted_orders().is_empty());
}

#[tokio::test]
async fn test_rising_market_aggressive_buys() {
    let mut h = harness(BotConfig::aggressive(), rising_bars());

    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    let signal = snapshot.last_signal.unwrap();
    assert_eq!(signal.direction(), Direction::Buy);
    assert_eq!(signal.confidence(), 65.0);
    assert!(signal.stop_loss() < signal.entry_price());
    assert!(signal.take_profit() > signal.entry_price());

    let orders = h.broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].magic, 234011);
    assert_eq!(orders[0].comment, "GOLDEX AI V11");
    assert!(orders[0].volume > 0.01 && orders[0].volume < 10.0);

    assert_eq!(snapshot.risk.total_trades, 1);
    assert_eq!(snapshot.active_trades, 1);
    assert_eq!(snapshot.last_trade_at, Some(start()));
    assert_eq!(h.sink.kinds(), vec!["trade_opened"]);
}

#[tokio::test]
async fn test_loss_streak_escalates_to_max_volume() {
    let mut config = BotConfig::aggressive();
    config.risk.martingale_multiplier = 2.0;
    let mut h = harness(config, rising_bars());
    h.session = h.session.with_risk_state(RiskState {
        consecutive_losses: 3,
        ..RiskState::new()
    });

    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.risk.current_multiplier, 8.0);
    let orders = h.broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].volume, 10.0);
}

#[tokio::test]
async fn test_missing_constraints_fall_back_to_minimum_volume() {
    let mut h = harness(BotConfig::aggressive(), rising_bars());
    h.broker.fail_constraints(true);

    h.session.run_cycle().await.unwrap();

    let signal = h.session.snapshot().last_signal.unwrap();
    assert_eq!(signal.lot_size(), 0.01);
    let orders = h.broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].volume, 0.01);
}

#[tokio::test]
async fn test_degraded_mode_analyzes_without_orders() {
    let mut h = harness(BotConfig::aggressive(), rising_bars());
    h.broker.fail_connect(true);

    h.session.run_cycle().await.unwrap();
    h.clock.advance(Duration::from_secs(60));
    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, SessionState::Degraded);
    assert!(!snapshot.connected);
    let signal = snapshot.last_signal.unwrap();
    assert_eq!(signal.direction(), Direction::Buy);
    assert_eq!(signal.lot_size(), 0.01);
    assert!(h.broker.submitted_orders().is_empty());
    assert_eq!(snapshot.risk.total_trades, 0);
}

#[tokio::test]
async fn test_cadence_blocks_until_trade_frequency_elapses() {
    let mut h = harness(BotConfig::aggressive(), rising_bars());

    h.session.run_cycle().await.unwrap();
    assert_eq!(h.broker.submitted_orders().len(), 1);

    h.clock.advance(Duration::from_secs(10));
    h.session.run_cycle().await.unwrap();
    assert_eq!(h.broker.submitted_orders().len(), 1);

    h.clock.advance(Duration::from_secs(20));
    h.session.run_cycle().await.unwrap();
    assert_eq!(h.broker.submitted_orders().len(), 2);
}

#[tokio::test]
async fn test_monitor_settles_losses_into_streak() {
    let mut h = harness(BotConfig::aggressive(), rising_bars());

    h.session.run_cycle().await.unwrap();
    h.broker.settle("100000", -35.0);

    h.clock.advance(Duration::from_secs(10));
    h.session.run_cycle().await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.risk.consecutive_losses, 1);
    assert_eq!(snapshot.risk.consecutive_wins, 0);
    assert_eq!(snapshot.active_trades, 0);
    assert_eq!(h.sink.kinds(), vec!["trade_opened", "trade_closed"]);

    let events = h.sink.events.lock().unwrap();
    match &events[1] {
        TradeEvent::TradeClosed {
            order_id,
            outcome,
            profit,
            ..
        } => {
            assert_eq!(order_id, "100000");
            assert_eq!(*outcome, TradeOutcome::Loss);
            assert_eq!(*profit, -35.0);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_analyst_signal_is_executed() {
    let reply = r#"Here is my view:
        {"signal": "BUY", "confidence": 92, "entry_price": 2000.0,
         "stop_loss": 1990.0, "take_profit": 2020.0, "reasoning": "support bounce"}
        Good luck."#;
    let h = harness(BotConfig::conservative(), flat_bars(60, 2000.0));
    let mut session = h.session.with_analyst(Arc::new(ScriptedAnalyst {
        reply: Ok(reply.to_string()),
    }));

    session.run_cycle().await.unwrap();

    let signal = session.snapshot().last_signal.unwrap();
    assert_eq!(signal.direction(), Direction::Buy);
    assert!(signal.reason().starts_with("AI:"));
    let orders = h.broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    // 5% of 10k over a 10 point stop on a 100 oz contract
    assert_eq!(orders[0].volume, 0.5);
}

#[tokio::test]
async fn test_malformed_or_weak_analyst_replies_are_ignored() {
    let replies = vec![
        Ok("I think gold goes up".to_string()),
        Ok(r#"{"signal": "BUY", "confidence": 60, "stop_loss": 1990.0, "take_profit": 2020.0}"#
            .to_string()),
        Ok(r#"{"signal": "BUY", "confidence": "#.to_string()),
        Err(AnalystError::Request("503 Service Unavailable".to_string())),
    ];

    for reply in replies {
        let h = harness(BotConfig::conservative(), flat_bars(60, 2000.0));
        let mut session = h.session.with_analyst(Arc::new(ScriptedAnalyst { reply }));

        session.run_cycle().await.unwrap();

        let signal = session.snapshot().last_signal.unwrap();
        assert_eq!(signal.direction(), Direction::None);
        assert!(h.broker.submitted_orders().is_empty());
    }
}

#[tokio::test]
async fn test_data_failure_is_reported_and_loop_continues() {
    let mut h = harness(BotConfig::conservative(), flat_bars(60, 2000.0));
    h.broker.fail_bars(true);

    assert!(h.session.run_cycle().await.is_err());

    h.broker.fail_bars(false);
    h.clock.advance(Duration::from_secs(30));
    h.session.run_cycle().await.unwrap();
    assert!(h.session.snapshot().last_signal.is_some());
}

#[tokio::test]
async fn test_run_stops_on_shutdown_without_real_sleeps() {
    let h = harness(BotConfig::aggressive(), rising_bars());
    let mut session = h.session;
    let (tx, rx) = watch::channel(false);
    let scheduler = Scheduler::new(Arc::new(h.clock.clone()), Duration::from_secs(10), rx);

    let target = start() + ChronoDuration::seconds(30);
    let watcher = h.clock.clone();
    tokio::spawn(async move {
        while watcher.now() < target {
            tokio::task::yield_now().await;
        }
        let _ = tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(5), session.run(scheduler))
        .await
        .expect("session should stop promptly");

    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!h.broker.is_connected());
    assert!(h.clock.now() >= target);
    assert!(session.snapshot().risk.total_trades >= 1);
}

#[tokio::test]
async fn test_run_with_shutdown_already_requested_only_cleans_up() {
    let h = harness(BotConfig::conservative(), flat_bars(60, 2000.0));
    let mut session = h.session;
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let scheduler = Scheduler::new(Arc::new(h.clock.clone()), Duration::from_secs(30), rx);

    session.run(scheduler).await;

    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.snapshot().last_signal.is_none());
    assert_eq!(h.clock.now(), start());
}
