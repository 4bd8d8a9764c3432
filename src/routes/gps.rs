use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::{list_limit, AppState};
use crate::{auth::DeviceAuth, error::ApiError, GpsFix, GpsFixInput};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/gps", get(list).post(create))
        .route("/gps/{id}", get(retrieve).put(update).delete(destroy))
}

/// Query parameters for listing GPS fixes
#[derive(Debug, Deserialize)]
pub struct GpsListQuery {
    device_id: Option<String>,
    limit: Option<i64>,
}

/// `GET /api/gps` – newest fixes first
async fn list(
    Query(params): Query<GpsListQuery>,
    State((pool, _)): State<AppState>,
) -> Result<Json<Vec<GpsFix>>, ApiError> {
    // ---
    info!("GET /api/gps - {:?}", params);

    let fixes = sqlx::query_as::<_, GpsFix>(
        r#"
        SELECT id, device_id, latitude, longitude, altitude, course, speed, ignition_on, timestamp
        FROM gps_data
        WHERE ($1::TEXT IS NULL OR device_id = $1)
        ORDER BY timestamp DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(params.device_id.as_deref())
    .bind(list_limit(params.limit))
    .fetch_all(&pool)
    .await?;

    debug!("GET /api/gps - Returning {} fixes", fixes.len());
    Ok(Json(fixes))
}

/// `POST /api/gps` – store a fix reported by an authenticated device
async fn create(
    State((pool, _)): State<AppState>,
    auth: DeviceAuth,
    Json(input): Json<GpsFixInput>,
) -> Result<(StatusCode, Json<GpsFix>), ApiError> {
    // ---
    info!("POST /api/gps - device {}", auth.device_id);

    input.validate()?;
    auth.ensure_owns(&input.device_id)?;

    let fix = store_fix(&pool, &input).await?;

    debug!("POST /api/gps - Stored fix {}", fix.id);
    Ok((StatusCode::CREATED, Json(fix)))
}

/// `GET /api/gps/{id}`
async fn retrieve(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
) -> Result<Json<GpsFix>, ApiError> {
    // ---
    info!("GET /api/gps/{}", id);

    sqlx::query_as::<_, GpsFix>(
        r#"
        SELECT id, device_id, latitude, longitude, altitude, course, speed, ignition_on, timestamp
        FROM gps_data
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(id))
}

/// `PUT /api/gps/{id}` – replace the reported fields, keeping the timestamp
async fn update(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
    Json(input): Json<GpsFixInput>,
) -> Result<Json<GpsFix>, ApiError> {
    // ---
    info!("PUT /api/gps/{}", id);

    input.validate()?;

    let fix = replace_fix(&pool, id, &input).await?.ok_or_else(|| not_found(id))?;

    debug!("PUT /api/gps/{} - Fix now belongs to {}", id, fix.device_id);
    Ok(Json(fix))
}

/// `DELETE /api/gps/{id}`
async fn destroy(
    Path(id): Path<i64>,
    State((pool, _)): State<AppState>,
) -> Result<StatusCode, ApiError> {
    // ---
    info!("DELETE /api/gps/{}", id);

    let result = sqlx::query("DELETE FROM gps_data WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---

/// Insert a fix and register its device (relay off) on first contact.
async fn store_fix(pool: &PgPool, input: &GpsFixInput) -> Result<GpsFix, sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    let fix = sqlx::query_as::<_, GpsFix>(
        r#"
        INSERT INTO gps_data (
            device_id, latitude, longitude, altitude, course, speed, ignition_on
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, device_id, latitude, longitude, altitude, course, speed, ignition_on, timestamp
        "#,
    )
    .bind(&input.device_id)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.altitude)
    .bind(input.course)
    .bind(input.speed)
    .bind(input.ignition_on)
    .fetch_one(&mut *tx)
    .await?;

    register_device(&mut tx, &input.device_id).await?;

    tx.commit().await?;
    Ok(fix)
}

/// Overwrite fix `id`, registering its (possibly new) device.
///
/// Returns `None` when no such fix exists; nothing is written then.
async fn replace_fix(
    pool: &PgPool,
    id: i64,
    input: &GpsFixInput,
) -> Result<Option<GpsFix>, sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    let fix = sqlx::query_as::<_, GpsFix>(
        r#"
        UPDATE gps_data
        SET device_id = $2, latitude = $3, longitude = $4, altitude = $5,
            course = $6, speed = $7, ignition_on = $8
        WHERE id = $1
        RETURNING id, device_id, latitude, longitude, altitude, course, speed, ignition_on, timestamp
        "#,
    )
    .bind(id)
    .bind(&input.device_id)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.altitude)
    .bind(input.course)
    .bind(input.speed)
    .bind(input.ignition_on)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(fix) = fix else {
        tx.rollback().await?;
        return Ok(None);
    };

    register_device(&mut tx, &fix.device_id).await?;

    tx.commit().await?;
    Ok(Some(fix))
}

/// Create the relay record (relay off) for a device seen for the first time.
async fn register_device(
    tx: &mut Transaction<'_, Postgres>,
    device_id: &str,
) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO devices (device_id) VALUES ($1)
        ON CONFLICT (device_id) DO NOTHING
        "#,
    )
    .bind(device_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("GPS record {}", id))
}
