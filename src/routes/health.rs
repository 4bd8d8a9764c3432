// src/routes/health.rs
//! Health check endpoint for the GPS tracker backend.
//!
//! `GET /health` reports whether the service is up and whether the database
//! answers a trivial query, so orchestrators can tell a running process
//! from a usable one.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// Handle `GET /health`.
///
/// Returns 200 with `status: "ok"` when the database responds, otherwise
/// 503 with `status: "degraded"`.
async fn health(State((pool, _)): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check could not reach the database: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "unreachable",
                }),
            )
        }
    }
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
