//! Movement statistics over stored GPS fixes.
//!
//! Everything in this module is a pure function of its input: the route
//! handlers fetch the fixes for a device and window, then call
//! [`summarize`] for a single window or [`breakdown`] for nested
//! day/week/month/year buckets.
//!
//! - `buckets` – calendar splitting and the recursive breakdown tree
//! - `period`  – window resolution and date parsing for request parameters

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;

use crate::models::GpsFix;

mod buckets;
mod period;

pub use buckets::{breakdown, Bucket, Granularity};
pub use period::{
    check_window, parse_date, parse_instant, parse_year, resolve_period, span_between, Period,
    RangeError,
};

// ---

/// Mean Earth radius used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fixes slower than this are classified as idle.
pub const IDLE_SPEED_KMH: f64 = 5.0;

/// Inclusive time window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Inclusive range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// From local midnight of `start` to the last microsecond of `end`.
    pub fn window(&self, offset: FixedOffset) -> TimeRange {
        let end = self
            .end
            .succ_opt()
            .map(|next| local_midnight(next, offset) - TimeDelta::microseconds(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        TimeRange {
            start: local_midnight(self.start, offset),
            end,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// UTC instant of midnight on `date` in the `offset` calendar.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// A fix as replayed to clients for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    pub ignition: bool,
}

impl From<&GpsFix> for RoutePoint {
    fn from(fix: &GpsFix) -> Self {
        RoutePoint {
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
            speed: fix.speed,
            ignition: fix.ignition_on,
        }
    }
}

/// Movement statistics for one window. Built per request, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub total_records: usize,
    pub total_distance_km: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub total_idle_time_hours: f64,
    pub total_moving_time_hours: f64,
    pub ignition_on_count: usize,
    pub ignition_off_count: usize,
    pub route_points: Vec<RoutePoint>,
}

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // ---
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // rounding can push `a` marginally above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Whether a fix counts towards idle time.
pub fn is_idle(fix: &GpsFix) -> bool {
    fix.speed < IDLE_SPEED_KMH || !fix.ignition_on
}

/// Compute the summary for fixes of one device within one window.
///
/// Input order does not matter; fixes are stably sorted by timestamp, so
/// fixes sharing a timestamp keep the order they were given in.
///
/// Idle time is the span between the first and the last idle fix, not the
/// sum of the individual idle stretches. Moving time is the elapsed time
/// minus that span.
pub fn summarize(fixes: &[GpsFix]) -> StatisticsSummary {
    summarize_refs(fixes.iter().collect())
}

pub(crate) fn summarize_refs(mut fixes: Vec<&GpsFix>) -> StatisticsSummary {
    // ---
    if fixes.is_empty() {
        return StatisticsSummary::default();
    }

    fixes.sort_by_key(|fix| fix.timestamp);

    let total_distance_km: f64 = fixes
        .windows(2)
        .map(|pair| {
            haversine_km(
                pair[0].latitude,
                pair[0].longitude,
                pair[1].latitude,
                pair[1].longitude,
            )
        })
        .sum();

    let speed_sum: f64 = fixes.iter().map(|fix| fix.speed).sum();
    let max_speed = fixes.iter().map(|fix| fix.speed).fold(0.0_f64, f64::max);
    let average_speed = speed_sum / fixes.len() as f64;

    let total_hours = span_hours(fixes.iter().copied());
    let idle_hours = span_hours(fixes.iter().copied().filter(|fix| is_idle(fix)));

    let ignition_on_count = fixes.iter().filter(|fix| fix.ignition_on).count();

    StatisticsSummary {
        total_records: fixes.len(),
        total_distance_km: round2(total_distance_km),
        average_speed_kmh: round2(average_speed),
        max_speed_kmh: round2(max_speed),
        total_idle_time_hours: round2(idle_hours),
        total_moving_time_hours: round2(total_hours - idle_hours),
        ignition_on_count,
        ignition_off_count: fixes.len() - ignition_on_count,
        route_points: fixes.iter().copied().map(RoutePoint::from).collect(),
    }
}

/// Hours between the first and last fix of an already sorted sequence.
fn span_hours<'a>(mut fixes: impl Iterator<Item = &'a GpsFix>) -> f64 {
    let Some(first) = fixes.next() else {
        return 0.0;
    };
    let last = fixes.last().unwrap_or(first);
    (last.timestamp - first.timestamp).num_milliseconds() as f64 / 3_600_000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
