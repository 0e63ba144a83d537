//! Date-range handling for report endpoints.
//!
//! Query parameters arrive as free-form strings. Anything that is not a
//! recognizable date is rejected so a typo never silently widens a report.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::CoreError;

/// An inclusive `[from, to]` window over UTC timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

impl DateRange {
    /// The `days` days leading up to `now`.
    #[must_use]
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            from: now - Duration::days(days),
            to: now,
        }
    }

    /// Resolve optional `date_from` / `date_to` query values into a range.
    ///
    /// Missing ends default to a trailing window of `default_days` ending at
    /// `now`. A bare `YYYY-MM-DD` covers the whole day on the side it bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDate`] when a value cannot be parsed and
    /// [`CoreError::InvertedRange`] when `from` is later than `to`.
    pub fn resolve(
        date_from: Option<&str>,
        date_to: Option<&str>,
        now: DateTime<Utc>,
        default_days: i64,
    ) -> Result<Self, CoreError> {
        let to = match non_blank(date_to) {
            Some(raw) => parse_boundary("date_to", raw, Bound::End)?,
            None => now,
        };
        let from = match non_blank(date_from) {
            Some(raw) => parse_boundary("date_from", raw, Bound::Start)?,
            None => to - Duration::days(default_days),
        };

        if from > to {
            return Err(CoreError::InvertedRange { from, to });
        }

        Ok(Self { from, to })
    }

    /// Like [`DateRange::resolve`] but leaves an absent end unbounded.
    ///
    /// # Errors
    ///
    /// Same as [`DateRange::resolve`].
    pub fn parse_optional(
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), CoreError> {
        let from = non_blank(date_from)
            .map(|raw| parse_boundary("date_from", raw, Bound::Start))
            .transpose()?;
        let to = non_blank(date_to)
            .map(|raw| parse_boundary("date_to", raw, Bound::End))
            .transpose()?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(CoreError::InvertedRange { from, to });
            }
        }

        Ok((from, to))
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_boundary(field: &'static str, raw: &str, bound: Bound) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
                .unwrap_or(NaiveTime::MIN),
        };
        return Ok(Utc.from_utc_datetime(&date.and_time(time)));
    }

    Err(CoreError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults_to_trailing_window() {
        let range = DateRange::resolve(None, None, now(), 30).unwrap();
        assert_eq!(range.to, now());
        assert_eq!(range.from, now() - Duration::days(30));
    }

    #[test]
    fn accepts_python_style_isoformat() {
        let range = DateRange::resolve(
            Some("2025-10-01T08:30:00.123456"),
            Some("2025-10-15T18:00:00"),
            now(),
            30,
        )
        .unwrap();
        assert_eq!(
            range.from,
            Utc.with_ymd_and_hms(2025, 10, 1, 8, 30, 0).unwrap()
                + Duration::microseconds(123_456)
        );
        assert_eq!(range.to, Utc.with_ymd_and_hms(2025, 10, 15, 18, 0, 0).unwrap());
    }

    #[test]
    fn accepts_rfc3339_with_offset() {
        let range =
            DateRange::resolve(Some("2025-10-01T05:30:00+05:30"), None, now(), 30).unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn bare_dates_cover_whole_days() {
        let range = DateRange::resolve(Some("2025-10-01"), Some("2025-10-01"), now(), 30).unwrap();
        assert_eq!(range.from, Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
        assert!(range.contains(Utc.with_ymd_and_hms(2025, 10, 1, 23, 59, 59).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn rejects_garbage_dates() {
        for raw in ["2025-13-45", "invalid", "2025-15-99T00:00:00"] {
            let err = DateRange::resolve(Some(raw), None, now(), 30).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidDate { field: "date_from", .. }),
                "{raw} should be rejected, got {err:?}"
            );
        }
        let err = DateRange::resolve(None, Some("also-invalid"), now(), 30).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDate { field: "date_to", .. }));
    }

    #[test]
    fn very_old_dates_are_valid() {
        let range = DateRange::resolve(Some("1900-01-01"), Some("1900-01-02"), now(), 30).unwrap();
        assert!(range.from < range.to);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::resolve(Some("2025-10-10"), Some("2025-10-01"), now(), 30).unwrap_err();
        assert!(matches!(err, CoreError::InvertedRange { .. }));
    }

    #[test]
    fn blank_values_are_treated_as_absent() {
        let (from, to) = DateRange::parse_optional(Some("  "), None).unwrap();
        assert!(from.is_none());
        assert!(to.is_none());
    }
}
