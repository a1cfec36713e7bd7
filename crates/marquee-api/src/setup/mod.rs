//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use marquee_core::Config;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Tasks spawned during setup that outlive request handling.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    pub cleanup: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Abort every task and wait for it to unwind.
    pub async fn shutdown(self) {
        if let Some(task) = self.cleanup {
            task.abort();
            match task.await {
                Err(e) if e.is_panic() => tracing::error!(error = %e, "Cleanup task panicked"),
                _ => tracing::info!("Cleanup task stopped"),
            }
        }
    }
}

pub struct Application {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub background: BackgroundTasks,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<Application> {
    crate::telemetry::init_telemetry(config.log_format())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;

    let (state, background) = services::initialize_services(&config, pool).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok(Application {
        state,
        router,
        background,
    })
}
