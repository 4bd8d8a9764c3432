//! Database schema management for `gps-tracker-backend`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `gps_data` for device fixes, `device_status_log` for module
/// status reports and `devices` for relay state. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Fixes reported by devices; `timestamp` is assigned by the server
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gps_data (
            id           BIGSERIAL        PRIMARY KEY,
            device_id    VARCHAR(100)     NOT NULL,
            latitude     DOUBLE PRECISION NOT NULL,
            longitude    DOUBLE PRECISION NOT NULL,
            altitude     DOUBLE PRECISION NOT NULL DEFAULT 0,
            course       DOUBLE PRECISION NOT NULL DEFAULT 0,
            speed        DOUBLE PRECISION NOT NULL DEFAULT 0 CHECK (speed >= 0),
            ignition_on  BOOLEAN          NOT NULL DEFAULT FALSE,
            timestamp    TIMESTAMPTZ      NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS device_status_log (
            id          BIGSERIAL    PRIMARY KEY,
            device_id   VARCHAR(100) NOT NULL,
            module      VARCHAR(20)  NOT NULL,
            status      VARCHAR(20)  NOT NULL DEFAULT 'INFO',
            message     TEXT         NOT NULL DEFAULT '',
            code        VARCHAR(50)  NOT NULL DEFAULT '',
            created_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Relay state per device, registered on its first fix
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id    VARCHAR(100) PRIMARY KEY,
            relay_state  BOOLEAN      NOT NULL DEFAULT FALSE,
            updated_at   TIMESTAMPTZ  NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Statistics always filter by device and time window
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_gps_data_device_timestamp
            ON gps_data (device_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_device_status_log_device_id
            ON device_status_log (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
