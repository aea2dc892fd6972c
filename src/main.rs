use goldex::application::session::Session;
use goldex::config::BotConfig;
use goldex::infrastructure::broker_factory::BrokerFactory;
use goldex::secrets::SecretConfig;
use goldex::task_runner::{Clock, Scheduler, SystemClock};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "goldex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env();
    config.validate()?;

    info!(
        "GOLDEX starting: {} on {} ({} profile, {:?} broker)",
        config.symbol, config.timeframe, config.profile.name, config.broker
    );
    info!(
        "Risk {:.1}% (max {:.1}%), martingale {}, booster {}, turbo {}",
        config.risk.risk_percentage,
        config.risk.max_risk_percentage,
        config.risk.enable_martingale,
        config.risk.enable_volume_booster,
        config.turbo_enabled
    );

    let secrets = SecretConfig::default();
    let (broker, credentials) = BrokerFactory::create_broker(&config, &secrets)?;
    let analyst = BrokerFactory::create_analyst(&config, &secrets);
    let sink = BrokerFactory::create_sink(&config).await;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(clock.clone(), config.poll_interval, shutdown_rx);

    let mut session = Session::new(config, broker, credentials, sink, clock);
    if let Some(analyst) = analyst {
        session = session.with_analyst(analyst);
    }

    tokio::spawn(async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("Shutdown requested, finishing current cycle...");
        let _ = shutdown_tx.send(true);
    });

    session.run(scheduler).await;

    let snapshot = session.snapshot();
    info!(
        "Final state: {} trades, {} wins, {} still active",
        snapshot.risk.total_trades, snapshot.risk.winning_trades, snapshot.active_trades
    );

    Ok(())
}
