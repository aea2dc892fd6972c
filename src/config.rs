use crate::domain::errors::BotError;
use crate::domain::repositories::broker_client::Timeframe;
use crate::domain::services::signal_generator::SignalProfile;
use crate::domain::services::trade_executor::ExecutorConfig;
use crate::domain::value_objects::position_sizing::RiskSettings;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SYMBOL: &str = "XAUUSD";
pub const DEFAULT_AI_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Which broker adapter the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Synthetic,
    Bridge,
}

impl FromStr for BrokerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synthetic" | "sim" | "demo" => Ok(BrokerKind::Synthetic),
            "bridge" | "mt5" => Ok(BrokerKind::Bridge),
            other => Err(format!("unknown broker kind '{}'", other)),
        }
    }
}

/// Immutable configuration for one trading session
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub profile: SignalProfile,
    pub risk: RiskSettings,
    /// Minimum time between regular analyses
    pub trade_frequency: Duration,
    /// Scheduler tick
    pub poll_interval: Duration,
    pub turbo_enabled: bool,
    pub turbo_interval: Duration,
    pub magic: u64,
    pub comment: String,
    pub max_open_positions: usize,
    /// Zero disables the daily cap
    pub max_trades_per_day: u32,
    pub collaborator_timeout: Duration,

    // Broker selection
    pub broker: BrokerKind,
    pub bridge_url: String,
    pub broker_login: Option<u64>,
    pub broker_server: String,

    // AI analyst
    pub ai_enabled: bool,
    pub ai_min_confidence: f64,
    pub ai_model: String,

    // Persistence; None logs events only
    pub database_url: Option<String>,

    // Synthetic broker
    pub synthetic_seed: u64,
    pub synthetic_win_rate: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::conservative()
    }
}

impl BotConfig {
    /// M15 bars, five-minute cadence, higher-conviction scoring
    pub fn conservative() -> Self {
        BotConfig {
            symbol: DEFAULT_SYMBOL.to_string(),
            timeframe: Timeframe::M15,
            bar_count: 100,
            profile: SignalProfile::conservative(),
            risk: RiskSettings::default(),
            trade_frequency: Duration::from_secs(300),
            poll_interval: Duration::from_secs(30),
            turbo_enabled: false,
            turbo_interval: Duration::from_secs(10),
            magic: 234000,
            comment: "GOLDEX AI".to_string(),
            max_open_positions: 3,
            max_trades_per_day: 0,
            collaborator_timeout: Duration::from_secs(10),

            broker: BrokerKind::Synthetic,
            bridge_url: "http://127.0.0.1:8080".to_string(),
            broker_login: None,
            broker_server: String::new(),

            ai_enabled: false,
            ai_min_confidence: 85.0,
            ai_model: DEFAULT_AI_MODEL.to_string(),

            database_url: None,

            synthetic_seed: 42,
            synthetic_win_rate: 0.7,
        }
    }

    /// M5 bars, 30 second cadence, turbo signal and escalating stakes
    pub fn aggressive() -> Self {
        BotConfig {
            timeframe: Timeframe::M5,
            profile: SignalProfile::aggressive(),
            risk: RiskSettings {
                risk_percentage: 8.0,
                max_risk_percentage: 15.0,
                progressive_threshold: 1,
                progressive_step: 0.5,
                enable_martingale: true,
                martingale_multiplier: 1.5,
                enable_volume_booster: true,
                volume_multiplier: 1.5,
                ..RiskSettings::default()
            },
            trade_frequency: Duration::from_secs(30),
            poll_interval: Duration::from_secs(10),
            turbo_enabled: true,
            turbo_interval: Duration::from_secs(10),
            magic: 234011,
            comment: "GOLDEX AI V11".to_string(),
            max_open_positions: 5,
            ..Self::conservative()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> BotConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `GOLDEX_PROFILE` picks the preset; every other variable overrides one
    /// field. Values outside their range are rejected with a warning and the
    /// preset value is kept.
    pub fn from_lookup<F>(lookup: F) -> BotConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("GOLDEX_PROFILE").map(|p| p.to_lowercase()) {
            Some(p) if p == "aggressive" || p == "v11" => BotConfig::aggressive(),
            Some(p) if p == "conservative" => BotConfig::conservative(),
            Some(p) => {
                tracing::warn!("Unknown GOLDEX_PROFILE '{}', using conservative", p);
                BotConfig::conservative()
            }
            None => BotConfig::conservative(),
        };

        if let Some(symbol) = lookup("GOLDEX_SYMBOL") {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() {
                tracing::warn!("Empty GOLDEX_SYMBOL, using default: {}", config.symbol);
            } else {
                config.symbol = symbol;
            }
        }

        if let Some(tf) = lookup("GOLDEX_TIMEFRAME") {
            match tf.parse::<Timeframe>() {
                Ok(value) => config.timeframe = value,
                Err(e) => tracing::warn!("{}, using default: {}", e, config.timeframe),
            }
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_BAR_COUNT", 60..=1000usize) {
            config.bar_count = value;
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_TRADE_FREQUENCY_SECONDS", 5..=86_400u64)
        {
            config.trade_frequency = Duration::from_secs(value);
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_POLL_INTERVAL_SECONDS", 1..=3600u64) {
            config.poll_interval = Duration::from_secs(value);
        }

        if let Some(enabled) = lookup("GOLDEX_TURBO_ENABLED") {
            config.turbo_enabled = parse_flag(&enabled);
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_TURBO_INTERVAL_SECONDS", 1..=3600u64) {
            config.turbo_interval = Duration::from_secs(value);
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_MAGIC", 1..=u64::MAX) {
            config.magic = value;
        }

        if let Some(comment) = lookup("GOLDEX_COMMENT") {
            config.comment = comment;
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_MAX_OPEN_POSITIONS", 1..=50usize) {
            config.max_open_positions = value;
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_MAX_TRADES_PER_DAY", 0..=500u32) {
            config.max_trades_per_day = value;
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_TIMEOUT_SECONDS", 1..=120u64) {
            config.collaborator_timeout = Duration::from_secs(value);
        }

        // Risk settings
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_RISK_PERCENTAGE", 0.1..=100.0) {
            config.risk.risk_percentage = value;
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_MAX_RISK_PERCENTAGE", 0.1..=100.0) {
            config.risk.max_risk_percentage = value;
        }
        if let Some(enabled) = lookup("GOLDEX_PROGRESSIVE_RISK") {
            config.risk.enable_progressive_risk = parse_flag(&enabled);
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_PROGRESSIVE_THRESHOLD", 0..=20u32) {
            config.risk.progressive_threshold = value;
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_PROGRESSIVE_STEP", 0.0..=5.0) {
            config.risk.progressive_step = value;
        }
        if let Some(enabled) = lookup("GOLDEX_MARTINGALE") {
            config.risk.enable_martingale = parse_flag(&enabled);
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_MARTINGALE_MULTIPLIER", 1.0..=5.0) {
            config.risk.martingale_multiplier = value;
        }
        if let Some(enabled) = lookup("GOLDEX_VOLUME_BOOSTER") {
            config.risk.enable_volume_booster = parse_flag(&enabled);
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_VOLUME_MULTIPLIER", 1.0..=10.0) {
            config.risk.volume_multiplier = value;
        }

        // Broker
        if let Some(kind) = lookup("GOLDEX_BROKER") {
            match kind.parse::<BrokerKind>() {
                Ok(value) => config.broker = value,
                Err(e) => tracing::warn!("{}, using default: {:?}", e, config.broker),
            }
        }
        if let Some(url) = lookup("GOLDEX_BRIDGE_URL") {
            config.bridge_url = url;
        }
        if let Some(login) = lookup("GOLDEX_BROKER_LOGIN") {
            match login.trim().parse::<u64>() {
                Ok(value) => config.broker_login = Some(value),
                Err(e) => tracing::warn!("Failed to parse GOLDEX_BROKER_LOGIN '{}': {}", login, e),
            }
        }
        if let Some(server) = lookup("GOLDEX_BROKER_SERVER") {
            config.broker_server = server;
        }

        // AI analyst
        if let Some(enabled) = lookup("GOLDEX_AI_ENABLED") {
            config.ai_enabled = parse_flag(&enabled);
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_AI_MIN_CONFIDENCE", 0.0..=100.0) {
            config.ai_min_confidence = value;
        }
        if let Some(model) = lookup("GOLDEX_AI_MODEL") {
            config.ai_model = model;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database_url = Some(url);
            }
        }

        if let Some(value) = parse_in_range(&lookup, "GOLDEX_SYNTHETIC_SEED", 0..=u64::MAX) {
            config.synthetic_seed = value;
        }
        if let Some(value) = parse_in_range(&lookup, "GOLDEX_SYNTHETIC_WIN_RATE", 0.0..=1.0) {
            config.synthetic_win_rate = value;
        }

        config
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), BotError> {
        if self.symbol.is_empty() {
            return Err(BotError::Configuration("symbol must not be empty".to_string()));
        }
        if self.bar_count < 60 {
            return Err(BotError::Configuration(format!(
                "bar_count {} is too small for a 50-bar moving average",
                self.bar_count
            )));
        }
        if self.poll_interval.is_zero() || self.trade_frequency.is_zero() {
            return Err(BotError::Configuration(
                "poll_interval and trade_frequency must be positive".to_string(),
            ));
        }
        if self.turbo_enabled && self.turbo_interval.is_zero() {
            return Err(BotError::Configuration(
                "turbo_interval must be positive when turbo is enabled".to_string(),
            ));
        }
        if self.max_open_positions == 0 {
            return Err(BotError::Configuration(
                "max_open_positions must be at least 1".to_string(),
            ));
        }
        if self.broker == BrokerKind::Bridge && self.broker_login.is_none() {
            return Err(BotError::Configuration(
                "bridge broker requires GOLDEX_BROKER_LOGIN".to_string(),
            ));
        }
        self.risk.validate().map_err(BotError::Configuration)?;
        self.profile.validate().map_err(BotError::Configuration)?;
        Ok(())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            symbol: self.symbol.clone(),
            magic: self.magic,
            comment: self.comment.clone(),
            max_open_positions: self.max_open_positions,
            max_trades_per_day: self.max_trades_per_day,
            call_timeout: self.collaborator_timeout,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

/// Parse `key` and keep it only when it falls inside `range`
fn parse_in_range<F, T>(lookup: &F, key: &str, range: std::ops::RangeInclusive<T>) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => Some(value),
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} (must be between {} and {}), using default",
                key,
                value,
                range.start(),
                range.end()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse {} '{}': {}, using default", key, raw, e);
            None
        }
    }
}
