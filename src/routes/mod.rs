//! Route gateway: merges the per-resource subrouters into the API router.
//!
//! `main.rs` only calls [`router`]; individual endpoints stay private to
//! their sibling modules.

use axum::Router;
use sqlx::PgPool;

use crate::Config;

mod gps;
mod health;
mod relay;
mod statistics;
mod status_logs;

/// Shared state handed to every handler.
pub type AppState = (PgPool, Config);

/// Upper bound for `limit` on list endpoints.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Default `limit` on list endpoints.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    let api = Router::new()
        .merge(gps::router())
        .merge(status_logs::router())
        .merge(relay::router())
        .merge(statistics::router());

    Router::new()
        .nest("/api", api)
        .merge(health::router())
        .with_state((pool, config))
}

/// Clamp a requested page size into `1..=MAX_LIST_LIMIT`.
pub fn list_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_list_limit() {
        // ---
        assert_eq!(list_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(Some(10)), 10);
        assert_eq!(list_limit(Some(0)), 1);
        assert_eq!(list_limit(Some(-5)), 1);
        assert_eq!(list_limit(Some(50_000)), MAX_LIST_LIMIT);
    }
}
