//! Date windows for panel queries
//!
//! Bounds arrive as loose strings from query parameters. Anything missing
//! or unparseable falls back to the default window instead of failing the
//! request.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Length of the default window ending now
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Resolve raw bounds against `now`.
    ///
    /// - end: parsed `end`, else `now`
    /// - start: parsed `start`, else `end - 30 days`
    /// - reversed bounds are swapped
    ///
    /// An `end` too close to the minimum representable date to fit a
    /// default window is dropped in favour of `now`.
    pub fn resolve(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> Self {
        let mut end = end.and_then(|raw| parse_bound("end", raw)).unwrap_or(now);
        let start = match start.and_then(|raw| parse_bound("start", raw)) {
            Some(start) => start,
            None => window_before(end).unwrap_or_else(|| {
                debug!(%end, "end bound leaves no room for the default window, using now");
                end = now;
                window_before(now).unwrap_or(now)
            }),
        };

        if start > end {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Same as [`resolve`](Self::resolve) against the current time
    pub fn resolve_now(start: Option<&str>, end: Option<&str>) -> Self {
        Self::resolve(start, end, Utc::now())
    }

    /// Widen to cover the first and last calendar day completely.
    pub fn whole_days(self) -> Self {
        let start = day_start(self.start.date_naive()).unwrap_or(self.start);
        let end = self
            .end
            .date_naive()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .map(|naive| naive.and_utc())
            .unwrap_or(self.end);
        Self { start, end }
    }
}

fn window_before(end: DateTime<Utc>) -> Option<DateTime<Utc>> {
    end.checked_sub_signed(Duration::days(DEFAULT_WINDOW_DAYS))
}

fn parse_bound(which: &'static str, raw: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_timestamp(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        debug!(bound = which, value = raw, "unparseable date bound, using default");
    }
    parsed
}

/// Parse an RFC 3339 timestamp, a naive ISO datetime (taken as UTC), or a
/// plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(day_start)
}

fn day_start(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults_to_thirty_days_ending_now() {
        let range = DateRange::resolve(None, None, now());
        assert_eq!(range.end, now());
        assert_eq!(range.start, now() - Duration::days(30));
    }

    #[test]
    fn start_default_is_relative_to_parsed_end() {
        let range = DateRange::resolve(None, Some("2024-02-10"), now());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap());
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn garbage_falls_back_instead_of_failing() {
        let range = DateRange::resolve(Some("last tuesday"), Some("soon"), now());
        assert_eq!(range, DateRange::resolve(None, None, now()));

        let range = DateRange::resolve(Some(""), Some("   "), now());
        assert_eq!(range.end, now());
    }

    #[test]
    fn accepts_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        for raw in [
            "2024-03-01T08:30:00Z",
            "2024-03-01T10:30:00+02:00",
            "2024-03-01T08:30:00",
            "2024-03-01 08:30:00.000",
            "2024-03-01T08:30",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn end_at_the_edge_of_the_calendar_falls_back_to_now() {
        let range = DateRange::resolve(None, Some("-262143-01-01"), now());
        assert_eq!(range, DateRange::resolve(None, None, now()));

        // An explicit start needs no arithmetic, so the far end is kept.
        let range = DateRange::resolve(Some("-262143-01-01"), Some("-262143-01-02"), now()).whole_days();
        assert_eq!(range.start.date_naive(), NaiveDate::MIN);
        assert!(range.end > range.start);
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let range = DateRange::resolve(Some("2024-03-20"), Some("2024-03-01"), now());
        assert!(range.start < range.end);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn whole_days_widens_to_day_edges() {
        let range = DateRange::resolve(Some("2024-03-01T15:00:00Z"), Some("2024-03-02T01:00:00Z"), now())
            .whole_days();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap() + Duration::microseconds(999_999)
        );
    }
}
