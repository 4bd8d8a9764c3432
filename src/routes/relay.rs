use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use super::AppState;
use crate::{error::ApiError, Device, RelayUpdate};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/relay/{device_id}", get(relay_status))
        .route("/relay/{device_id}/set", post(set_relay))
}

/// `GET /api/relay/{device_id}` – current relay state
async fn relay_status(
    Path(device_id): Path<String>,
    State((pool, _)): State<AppState>,
) -> Result<Json<Device>, ApiError> {
    // ---
    info!("GET /api/relay/{}", device_id);

    sqlx::query_as::<_, Device>(
        r#"
        SELECT device_id, relay_state, updated_at
        FROM devices
        WHERE device_id = $1
        "#,
    )
    .bind(&device_id)
    .fetch_optional(&pool)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(&device_id))
}

/// `POST /api/relay/{device_id}/set` – switch the relay on or off
async fn set_relay(
    Path(device_id): Path<String>,
    State((pool, _)): State<AppState>,
    Json(update): Json<RelayUpdate>,
) -> Result<Json<Device>, ApiError> {
    // ---
    info!("POST /api/relay/{}/set - relay_state={}", device_id, update.relay_state);

    sqlx::query_as::<_, Device>(
        r#"
        UPDATE devices
        SET relay_state = $2, updated_at = NOW()
        WHERE device_id = $1
        RETURNING device_id, relay_state, updated_at
        "#,
    )
    .bind(&device_id)
    .bind(update.relay_state)
    .fetch_optional(&pool)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(&device_id))
}

fn not_found(device_id: &str) -> ApiError {
    ApiError::NotFound(format!("Device '{}'", device_id))
}
