//! Calendar buckets and the nested breakdown tree.
//!
//! A single recursive function serves all four levels: split the requested
//! span into buckets of one [`Granularity`], summarize the fixes falling in
//! each bucket, then break every bucket down by the next finer granularity.

use chrono::{Datelike, Days, FixedOffset, Month, Months, NaiveDate};
use serde::Serialize;

use super::{summarize_refs, DateSpan, StatisticsSummary};
use crate::models::GpsFix;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Granularity each bucket is broken down into, if any.
    pub fn child(self) -> Option<Granularity> {
        match self {
            Granularity::Day => None,
            Granularity::Week => Some(Granularity::Day),
            Granularity::Month => Some(Granularity::Week),
            Granularity::Year => Some(Granularity::Month),
        }
    }

    /// Split `span` into consecutive buckets.
    ///
    /// Weeks start on the Monday on or before `span.start` and are clipped to
    /// `span.end`. Months and years are clipped to `span` at both ends.
    pub fn split(self, span: DateSpan) -> Vec<DateSpan> {
        // ---
        let mut buckets = Vec::new();
        let mut cursor = match self {
            Granularity::Day => span.start,
            Granularity::Week => monday_on_or_before(span.start),
            Granularity::Month => span.start.with_day(1).unwrap_or(span.start),
            Granularity::Year => span.start.with_ordinal(1).unwrap_or(span.start),
        };

        while cursor <= span.end {
            let Some(next) = self.advance(cursor) else {
                buckets.push(self.clip(cursor, span.end, span));
                break;
            };
            let natural_end = next.pred_opt().unwrap_or(cursor);
            buckets.push(self.clip(cursor, natural_end, span));
            cursor = next;
        }

        buckets
    }

    /// Days whose fixes a breakdown of `span` reads, nested levels included.
    ///
    /// Any level above days ends in weeks, and the first of those starts on
    /// the Monday on or before `span.start`.
    pub fn covering(self, span: DateSpan) -> DateSpan {
        match self {
            Granularity::Day => span,
            _ => DateSpan {
                start: monday_on_or_before(span.start),
                end: span.end,
            },
        }
    }

    fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => date.succ_opt(),
            Granularity::Week => date.checked_add_days(Days::new(7)),
            Granularity::Month => date.checked_add_months(Months::new(1)),
            Granularity::Year => date.checked_add_months(Months::new(12)),
        }
    }

    fn clip(self, start: NaiveDate, end: NaiveDate, span: DateSpan) -> DateSpan {
        let end = end.min(span.end);
        match self {
            // a week keeps its Monday even when that precedes the span
            Granularity::Week => DateSpan { start, end },
            _ => DateSpan {
                start: start.max(span.start),
                end,
            },
        }
    }

    fn key(self, span: DateSpan) -> BucketKey {
        match self {
            Granularity::Day => BucketKey::Day { date: span.start },
            Granularity::Week => BucketKey::Week {
                week_start: span.start,
                week_end: span.end,
            },
            Granularity::Month => BucketKey::Month {
                year: span.start.year(),
                month: span.start.month(),
                month_name: month_name(span.start.month()),
            },
            Granularity::Year => BucketKey::Year {
                year: span.start.year(),
            },
        }
    }
}

fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(date)
}

fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map_or("", |m| m.name())
}

/// Identifies a bucket in the serialized tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BucketKey {
    Day {
        date: NaiveDate,
    },
    Week {
        week_start: NaiveDate,
        week_end: NaiveDate,
    },
    Month {
        year: i32,
        month: u32,
        month_name: &'static str,
    },
    Year {
        year: i32,
    },
}

/// Child buckets, named after their granularity when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Breakdown {
    #[serde(rename = "daily_breakdown")]
    Daily(Vec<Bucket>),
    #[serde(rename = "weekly_breakdown")]
    Weekly(Vec<Bucket>),
    #[serde(rename = "monthly_breakdown")]
    Monthly(Vec<Bucket>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    #[serde(flatten)]
    pub key: BucketKey,
    #[serde(flatten)]
    pub summary: StatisticsSummary,
    #[serde(flatten)]
    pub breakdown: Option<Breakdown>,
}

/// Summarize `fixes` per bucket of `granularity` over `span`, nesting finer
/// breakdowns below each bucket.
///
/// Bucket windows are local calendar days in `offset`, inclusive at both ends.
/// `fixes` should span `granularity.covering(span)` so that weeks starting
/// before their month or year are complete.
pub fn breakdown(
    fixes: &[GpsFix],
    granularity: Granularity,
    span: DateSpan,
    offset: FixedOffset,
) -> Vec<Bucket> {
    let fixes: Vec<&GpsFix> = fixes.iter().collect();
    breakdown_refs(&fixes, granularity, span, offset)
}

fn breakdown_refs(
    fixes: &[&GpsFix],
    granularity: Granularity,
    span: DateSpan,
    offset: FixedOffset,
) -> Vec<Bucket> {
    // ---
    granularity
        .split(span)
        .into_iter()
        .map(|bucket_span| {
            let window = bucket_span.window(offset);
            let in_bucket: Vec<&GpsFix> = fixes
                .iter()
                .copied()
                .filter(|fix| window.contains(fix.timestamp))
                .collect();

            // a nested week may reach back before its parent bucket
            let breakdown = granularity.child().map(|child| {
                let reach = child.covering(bucket_span).window(offset);
                let in_reach: Vec<&GpsFix> = fixes
                    .iter()
                    .copied()
                    .filter(|fix| reach.contains(fix.timestamp))
                    .collect();
                let children = breakdown_refs(&in_reach, child, bucket_span, offset);
                match child {
                    Granularity::Day => Breakdown::Daily(children),
                    Granularity::Week => Breakdown::Weekly(children),
                    Granularity::Month | Granularity::Year => Breakdown::Monthly(children),
                }
            });

            Bucket {
                key: granularity.key(bucket_span),
                summary: summarize_refs(in_bucket),
                breakdown,
            }
        })
        .collect()
}
