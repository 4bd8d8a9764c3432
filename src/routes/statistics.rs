//! Statistics endpoints.
//!
//! Request parameters are parsed and validated here; the fixes for the
//! resulting window are fetched once and handed to the pure functions in
//! [`crate::stats`].

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info};

use super::AppState;
use crate::{
    error::ApiError,
    stats::{self, Bucket, DateSpan, Granularity, Period, StatisticsSummary, TimeRange},
    GpsFix,
};

// ---

/// Longest range accepted by the daily and weekly breakdowns.
const MAX_BREAKDOWN_DAYS: i64 = 366;

/// Most years accepted by the yearly breakdown.
const MAX_YEARS: i32 = 50;

/// Longest explicit `start`/`end` window accepted by the summary.
const MAX_SUMMARY_DAYS: i64 = 366;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/statistics/{device_id}", get(summary))
        .route("/statistics/{device_id}/daily", get(daily))
        .route("/statistics/{device_id}/weekly", get(weekly))
        .route("/statistics/{device_id}/monthly", get(monthly))
        .route("/statistics/{device_id}/yearly", get(yearly))
}

/// Either a keyword period or an explicit `start`/`end` pair
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

/// Inclusive local date range for daily and weekly breakdowns
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyQuery {
    year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YearlyQuery {
    start_year: Option<String>,
    end_year: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<&'static str>,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
    statistics: StatisticsSummary,
}

#[derive(Debug, Serialize)]
struct BreakdownResponse {
    device_id: String,
    granularity: &'static str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    breakdown: Vec<Bucket>,
}

// ---

/// `GET /api/statistics/{device_id}`
async fn summary(
    Path(device_id): Path<String>,
    Query(params): Query<SummaryQuery>,
    State((pool, config)): State<AppState>,
) -> Result<Json<SummaryResponse>, ApiError> {
    // ---
    info!("GET /api/statistics/{} - {:?}", device_id, params);

    let (period, range) = resolve_summary_window(&params, Utc::now(), config.local_offset)?;

    let fixes = fetch_fixes(&pool, &device_id, range).await?;
    debug!("GET /api/statistics/{} - Summarizing {} fixes", device_id, fixes.len());

    Ok(Json(SummaryResponse {
        device_id,
        period: period.map(period_name),
        start: range.start,
        end: range.end,
        statistics: stats::summarize(&fixes),
    }))
}

/// `GET /api/statistics/{device_id}/daily`
async fn daily(
    Path(device_id): Path<String>,
    Query(params): Query<DateRangeQuery>,
    State((pool, config)): State<AppState>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    // ---
    info!("GET /api/statistics/{}/daily - {:?}", device_id, params);

    let today = local_today(config.local_offset);
    let span = resolve_date_range(&params, today, 7)?;
    breakdown_response(&pool, device_id, Granularity::Day, span, config.local_offset).await
}

/// `GET /api/statistics/{device_id}/weekly`
async fn weekly(
    Path(device_id): Path<String>,
    Query(params): Query<DateRangeQuery>,
    State((pool, config)): State<AppState>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    // ---
    info!("GET /api/statistics/{}/weekly - {:?}", device_id, params);

    let today = local_today(config.local_offset);
    let span = resolve_date_range(&params, today, 28)?;
    breakdown_response(&pool, device_id, Granularity::Week, span, config.local_offset).await
}

/// `GET /api/statistics/{device_id}/monthly`
async fn monthly(
    Path(device_id): Path<String>,
    Query(params): Query<MonthlyQuery>,
    State((pool, config)): State<AppState>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    // ---
    info!("GET /api/statistics/{}/monthly - {:?}", device_id, params);

    let today = local_today(config.local_offset);
    let span = resolve_year(&params, today)?;
    breakdown_response(&pool, device_id, Granularity::Month, span, config.local_offset).await
}

/// `GET /api/statistics/{device_id}/yearly`
async fn yearly(
    Path(device_id): Path<String>,
    Query(params): Query<YearlyQuery>,
    State((pool, config)): State<AppState>,
) -> Result<Json<BreakdownResponse>, ApiError> {
    // ---
    info!("GET /api/statistics/{}/yearly - {:?}", device_id, params);

    let today = local_today(config.local_offset);
    let span = resolve_year_range(&params, today)?;
    breakdown_response(&pool, device_id, Granularity::Year, span, config.local_offset).await
}

// ---

async fn breakdown_response(
    pool: &PgPool,
    device_id: String,
    granularity: Granularity,
    span: DateSpan,
    offset: FixedOffset,
) -> Result<Json<BreakdownResponse>, ApiError> {
    // ---
    // nested weeks may start before the requested first day
    let window = granularity.covering(span).window(offset);
    let fixes = fetch_fixes(pool, &device_id, window).await?;

    debug!(
        "Breaking down {} fixes for {} from {} to {}",
        fixes.len(),
        device_id,
        span.start,
        span.end
    );

    Ok(Json(BreakdownResponse {
        device_id,
        granularity: granularity_name(granularity),
        start_date: span.start,
        end_date: span.end,
        breakdown: stats::breakdown(&fixes, granularity, span, offset),
    }))
}

/// Fixes of one device within `range`, in storage order.
async fn fetch_fixes(
    pool: &PgPool,
    device_id: &str,
    range: TimeRange,
) -> Result<Vec<GpsFix>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, GpsFix>(
        r#"
        SELECT id, device_id, latitude, longitude, altitude, course, speed, ignition_on, timestamp
        FROM gps_data
        WHERE device_id = $1 AND timestamp BETWEEN $2 AND $3
        ORDER BY id
        "#,
    )
    .bind(device_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await
}

fn local_today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

fn period_name(period: Period) -> &'static str {
    match period {
        Period::Day => "day",
        Period::Week => "week",
        Period::Month => "month",
        Period::Year => "year",
    }
}

fn granularity_name(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Day => "daily",
        Granularity::Week => "weekly",
        Granularity::Month => "monthly",
        Granularity::Year => "yearly",
    }
}

/// Explicit `start`/`end` win over `period`; with neither the last day is used.
fn resolve_summary_window(
    params: &SummaryQuery,
    now: chrono::DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(Option<Period>, TimeRange), ApiError> {
    // ---
    match (&params.start, &params.end) {
        (Some(start), Some(end)) => {
            let range = TimeRange {
                start: stats::parse_instant("start", start, offset, false)?,
                end: stats::parse_instant("end", end, offset, true)?,
            };
            Ok((None, stats::check_window(range, MAX_SUMMARY_DAYS)?))
        }
        (Some(_), None) | (None, Some(_)) => Err(ApiError::BadRequest(
            "start and end must be given together".to_string(),
        )),
        (None, None) => {
            let period = match &params.period {
                Some(keyword) => keyword.parse::<Period>()?,
                None => Period::Day,
            };
            Ok((Some(period), stats::resolve_period(period, now)))
        }
    }
}

/// Resolve `start_date`/`end_date`, defaulting to the `default_days` ending today.
fn resolve_date_range(
    params: &DateRangeQuery,
    today: NaiveDate,
    default_days: u64,
) -> Result<DateSpan, ApiError> {
    // ---
    let end = match &params.end_date {
        Some(value) => stats::parse_date("end_date", value)?,
        None => today,
    };
    let start = match &params.start_date {
        Some(value) => stats::parse_date("start_date", value)?,
        None => end
            .checked_sub_days(Days::new(default_days.saturating_sub(1)))
            .unwrap_or(end),
    };

    Ok(stats::span_between(start, end, MAX_BREAKDOWN_DAYS)?)
}

/// Calendar year given by `year`, defaulting to the current one.
fn resolve_year(params: &MonthlyQuery, today: NaiveDate) -> Result<DateSpan, ApiError> {
    let year = match &params.year {
        Some(value) => stats::parse_year("year", value)?,
        None => today.year(),
    };
    year_span(year, year)
}

/// Years `start_year..=end_year`, each defaulting to the current year.
fn resolve_year_range(params: &YearlyQuery, today: NaiveDate) -> Result<DateSpan, ApiError> {
    // ---
    let start_year = match &params.start_year {
        Some(value) => stats::parse_year("start_year", value)?,
        None => today.year(),
    };
    let end_year = match &params.end_year {
        Some(value) => stats::parse_year("end_year", value)?,
        None => today.year().max(start_year),
    };

    if start_year > end_year {
        return Err(ApiError::BadRequest(format!(
            "start_year ({}) is after end_year ({})",
            start_year, end_year
        )));
    }
    if end_year - start_year + 1 > MAX_YEARS {
        return Err(ApiError::BadRequest(format!(
            "at most {} years can be requested at once",
            MAX_YEARS
        )));
    }

    year_span(start_year, end_year)
}

fn year_span(start_year: i32, end_year: i32) -> Result<DateSpan, ApiError> {
    match (
        NaiveDate::from_ymd_opt(start_year, 1, 1),
        NaiveDate::from_ymd_opt(end_year, 12, 31),
    ) {
        (Some(start), Some(end)) => Ok(DateSpan { start, end }),
        _ => Err(ApiError::BadRequest(format!(
            "years {}..{} are out of range",
            start_year, end_year
        ))),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn bad_request(result: Result<impl std::fmt::Debug, ApiError>) -> String {
        match result {
            Err(ApiError::BadRequest(message)) => message,
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_summary_window_defaults_to_last_day() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let (period, range) =
            resolve_summary_window(&SummaryQuery::default(), now, utc()).unwrap();

        assert_eq!(period, Some(Period::Day));
        assert_eq!(range.end, now);
        assert_eq!(range.start, now - TimeDelta::days(1));
    }

    #[test]
    fn test_summary_window_keyword_and_explicit_range() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();

        let params = SummaryQuery {
            period: Some("week".to_string()),
            ..Default::default()
        };
        let (period, range) = resolve_summary_window(&params, now, utc()).unwrap();
        assert_eq!(period, Some(Period::Week));
        assert_eq!(range.start, now - TimeDelta::days(7));

        // explicit bounds win over the keyword
        let params = SummaryQuery {
            period: Some("year".to_string()),
            start: Some("2025-06-01".to_string()),
            end: Some("2025-06-01".to_string()),
        };
        let (period, range) = resolve_summary_window(&params, now, utc()).unwrap();
        assert_eq!(period, None);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap() - TimeDelta::microseconds(1)
        );
    }

    #[test]
    fn test_summary_window_rejects_bad_input() {
        // ---
        let now = Utc::now();

        let unknown = SummaryQuery {
            period: Some("fortnight".to_string()),
            ..Default::default()
        };
        assert!(bad_request(resolve_summary_window(&unknown, now, utc())).contains("fortnight"));

        let half_open = SummaryQuery {
            start: Some("2025-06-01".to_string()),
            ..Default::default()
        };
        assert!(bad_request(resolve_summary_window(&half_open, now, utc())).contains("together"));

        let reversed = SummaryQuery {
            start: Some("2025-06-02T00:00:00Z".to_string()),
            end: Some("2025-06-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(bad_request(resolve_summary_window(&reversed, now, utc())).contains("after"));

        let garbage = SummaryQuery {
            start: Some("yesterday".to_string()),
            end: Some("2025-06-01".to_string()),
            ..Default::default()
        };
        assert!(bad_request(resolve_summary_window(&garbage, now, utc())).contains("yesterday"));
    }

    #[test]
    fn test_summary_window_is_capped() {
        // ---
        let now = Utc::now();

        let everything = SummaryQuery {
            start: Some("1970-01-01".to_string()),
            end: Some("9999-12-31".to_string()),
            ..Default::default()
        };
        assert!(bad_request(resolve_summary_window(&everything, now, utc())).contains("exceeds"));

        // a leap year of whole local days is still accepted
        let leap_year = SummaryQuery {
            start: Some("2024-01-01".to_string()),
            end: Some("2024-12-31".to_string()),
            ..Default::default()
        };
        let (_, range) = resolve_summary_window(&leap_year, now, utc()).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_date_range_defaults_and_limits() {
        // ---
        let today = date(2025, 6, 15);

        let span = resolve_date_range(&DateRangeQuery::default(), today, 7).unwrap();
        assert_eq!(span, DateSpan { start: date(2025, 6, 9), end: today });
        assert_eq!(span.days(), 7);

        let params = DateRangeQuery {
            start_date: Some("2025-03-01".to_string()),
            end_date: Some("2025-03-03".to_string()),
        };
        assert_eq!(resolve_date_range(&params, today, 7).unwrap().days(), 3);

        let too_long = DateRangeQuery {
            start_date: Some("2020-01-01".to_string()),
            end_date: Some("2025-01-01".to_string()),
        };
        assert!(bad_request(resolve_date_range(&too_long, today, 7)).contains("exceeds"));

        let malformed = DateRangeQuery {
            start_date: Some("03/01/2025".to_string()),
            end_date: None,
        };
        assert!(bad_request(resolve_date_range(&malformed, today, 7)).contains("start_date"));
    }

    #[test]
    fn test_year_resolution() {
        // ---
        let today = date(2025, 6, 15);

        assert_eq!(
            resolve_year(&MonthlyQuery::default(), today).unwrap(),
            DateSpan { start: date(2025, 1, 1), end: date(2025, 12, 31) }
        );
        assert_eq!(
            resolve_year(&MonthlyQuery { year: Some("2024".to_string()) }, today)
                .unwrap()
                .days(),
            366
        );

        let params = YearlyQuery {
            start_year: Some("2022".to_string()),
            end_year: None,
        };
        assert_eq!(
            resolve_year_range(&params, today).unwrap(),
            DateSpan { start: date(2022, 1, 1), end: date(2025, 12, 31) }
        );

        let reversed = YearlyQuery {
            start_year: Some("2025".to_string()),
            end_year: Some("2020".to_string()),
        };
        assert!(bad_request(resolve_year_range(&reversed, today)).contains("after"));

        let too_many = YearlyQuery {
            start_year: Some("1970".to_string()),
            end_year: Some("2025".to_string()),
        };
        assert!(bad_request(resolve_year_range(&too_many, today)).contains("at most"));
    }

    #[test]
    fn test_names() {
        // ---
        assert_eq!(period_name(Period::Month), "month");
        assert_eq!(granularity_name(Granularity::Week), "weekly");
    }
}
