use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use meteotrack_core::App;
use meteotrack_services::{RefreshScheduler, RefreshService, SqliteForecastStore};
use meteotrack_weather::{WeatherProvider, WeatherQuery};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    meteotrack_core::init()?;

    let mut app = App::load()?;
    let config = app.shared_config();

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let store = SqliteForecastStore::open(&config.database.path).with_context(|| {
        format!("Failed to open database at {}", config.database.path.display())
    })?;

    for seed in &config.tracked_locations {
        match store.ensure_location(&seed.name, seed.latitude, seed.longitude) {
            Ok(location) => tracing::debug!("Tracking {} ({})", location.name, location.id),
            Err(e) => tracing::warn!("Skipping seed location {}: {}", seed.name, e),
        }
    }

    let provider = WeatherProvider::new(
        config.provider.base_url.clone(),
        Duration::from_secs(config.provider.timeout_seconds),
    )?;
    let service = RefreshService::new(WeatherQuery::new(provider), Arc::new(store));
    app.register_task(Box::new(RefreshScheduler::new(service).start()));

    tracing::info!("MeteoTrack started, database: {}", config.database.path.display());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    // Graceful shutdown
    app.shutdown().await?;

    Ok(())
}
