use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{list_limit, AppState};
use crate::{auth::DeviceAuth, error::ApiError, DeviceStatusLog, StatusLogInput};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/status-logs", get(list).post(create))
        .route(
            "/status-logs/{id}",
            get(retrieve).put(update).delete(destroy),
        )
}

/// Query parameters for listing status logs
#[derive(Debug, Deserialize)]
pub struct StatusLogQuery {
    device_id: Option<String>,
    limit: Option<i64>,
}

async fn list(
    Query(params): Query<StatusLogQuery>,
    State((pool, _)): State<AppState>,
) -> Result<Json<Vec<DeviceStatusLog>>, ApiError> {
    // ---
    info!("GET /api/status-logs - {:?}", params);

    let logs = sqlx::query_as::<_, DeviceStatusLog>(
        r#"
        SELECT id, device_id, module, status, message, code, created_at
        FROM device_status_log
        WHERE ($1::TEXT IS NULL OR device_id = $1)
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(list_limit(params.limit))
    .fetch_all(&pool)
    .await?;

    debug!("GET /api/status-logs - Returning {} entries", logs.len());
    Ok(Json(logs))
}

async fn create(
    State((pool, _)): State<AppState>,
    auth: DeviceAuth,
    Json(input): Json<StatusLogInput>,
) -> Result<(StatusCode, Json<DeviceStatusLog>), ApiError> {
    // ---
    info!(
        "POST /api/status-logs - device {} {} {}",
        auth.device_id,
        input.module.as_str(),
        input.status.as_str()
    );

    input.validate()?;
    auth.ensure_owns(&input.device_id)?;

    let log = sqlx::query_as::<_, DeviceStatusLog>(
        r#"
        INSERT INTO device_status_log (device_id, module, status, message, code)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, device_id, module, status, message, code, created_at
        "#,
    )
    .bind(&input.device_id)
    .bind(input.module.as_str())
    .bind(input.status.as_str())
    .bind(&input.message)
    .bind(&input.code)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(log)))
}

async fn retrieve(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
) -> Result<Json<DeviceStatusLog>, ApiError> {
    // ---
    info!("GET /api/status-logs/{}", id);

    sqlx::query_as::<_, DeviceStatusLog>(
        r#"
        SELECT id, device_id, module, status, message, code, created_at
        FROM device_status_log
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(id))
}

async fn update(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
    Json(input): Json<StatusLogInput>,
) -> Result<Json<DeviceStatusLog>, ApiError> {
    // ---
    info!("PUT /api/status-logs/{}", id);

    input.validate()?;

    sqlx::query_as::<_, DeviceStatusLog>(
        r#"
        UPDATE device_status_log
        SET device_id = $2, module = $3, status = $4, message = $5, code = $6
        WHERE id = $1
        RETURNING id, device_id, module, status, message, code, created_at
        "#,
    )
    .bind(id)
    .bind(&input.device_id)
    .bind(input.module.as_str())
    .bind(input.status.as_str())
    .bind(&input.message)
    .bind(&input.code)
    .fetch_optional(&pool)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(id))
}

async fn destroy(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
) -> Result<StatusCode, ApiError> {
    // ---
    info!("DELETE /api/status-logs/{}", id);

    let result = sqlx::query("DELETE FROM device_status_log WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Status log {}", id))
}
