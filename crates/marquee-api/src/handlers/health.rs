use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub documents: &'static str,
}

async fn check_database(state: &AppState) -> &'static str {
    let Some(pool) = &state.database else {
        return "not_configured";
    };

    match tokio::time::timeout(DATABASE_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await
    {
        Ok(Ok(_)) => "healthy",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unhealthy"
        }
        Err(_) => {
            tracing::warn!("Database health check timed out");
            "timeout"
        }
    }
}

async fn check_documents(state: &AppState) -> &'static str {
    match tokio::fs::metadata(state.documents.root()).await {
        Ok(meta) if meta.is_dir() => "healthy",
        Ok(_) => "unhealthy",
        Err(e) => {
            tracing::warn!(error = %e, "Document store health check failed");
            "unhealthy"
        }
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let documents = check_documents(&state).await;

    let healthy = matches!(database, "healthy" | "not_configured") && documents == "healthy";
    let (status_code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            database,
            documents,
        }),
    )
}
