use candlewick::CandlewickError;
use candlewick::config::fetch_config;
use candlewick::sink;
use candlewick::websocket::ConnectionSupervisor;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), CandlewickError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    info!(
        symbol = %app_config.bootstrap.symbol,
        timeframe_secs = app_config.stream.timeframe_secs,
        "Starting feed"
    );

    let (tx, rx) = sink::channel();
    let logger = tokio::spawn(sink::log_events(rx));

    let supervisor = ConnectionSupervisor::new(app_config.bootstrap, app_config.stream, tx);
    tokio::select! {
        session = supervisor.run() => {
            info!(
                bars = session.bars().len(),
                signals = session.signals().len(),
                "Feed stopped"
            );
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    sink::join_consumer(logger).await;
    Ok(())
}
