pub mod app;
pub mod config;
pub mod error;
pub mod task;

pub use app::App;
pub use config::{Config, DatabaseConfig, ProviderConfig, SeedLocation, ValidationResult};
pub use error::{DatabaseError, RusqliteErrorExt};
pub use task::{JoinFuture, ManagedTask};

use anyhow::Result;

/// Initialize logging for the process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("MeteoTrack core initialized");
    Ok(())
}
