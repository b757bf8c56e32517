use std::sync::Arc;

use tracing::info;

use slotbook::config::Config;
use slotbook::engine::Engine;
use slotbook::lifecycle;
use slotbook::notify::NotifyHub;
use slotbook::{http, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Refuses to start half-configured: every required variable or nothing.
    let config = Config::from_env()?;
    observability::init(config.metrics_port);

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.data_dir.join("calendar.wal");

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(wal_path, config.catalog.clone(), notify)?);

    // The process may have slept through a week boundary; sweep before serving.
    lifecycle::startup_reconcile(&engine, config.reset_timezone).await?;
    tokio::spawn(lifecycle::run_weekly_reset(
        engine.clone(),
        config.reset_timezone,
        config.reset_time,
    ));

    info!("slotbook listening on {}:{}", config.bind, config.port);
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  weekly reset: Monday {} ({})",
        config.reset_time.format("%H:%M"),
        config.reset_timezone
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    http::serve(engine, config).await?;

    info!("slotbook stopped");
    Ok(())
}
