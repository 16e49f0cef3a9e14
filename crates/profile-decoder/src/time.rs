//! Observation-time decoding.
//!
//! Argo files store time either as a numeric offset with a CF-style units
//! string ("days since 1950-01-01 00:00:00 UTC") or as already-resolved
//! timestamps. Decoding is attempted unit-aware first, then falls back to a
//! generic UNIX-timestamp interpretation. Both failing yields `None` for
//! that value; time decoding never fails a file.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Decode a slice of raw time values into UTC timestamps.
///
/// `fill` is the variable's missing-value sentinel, if any; sentinel and
/// non-finite entries decode to `None`.
pub fn decode_time_values(
    values: &[f64],
    units: Option<&str>,
    fill: Option<f64>,
) -> Vec<Option<DateTime<Utc>>> {
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() || fill.map_or(false, |f| v == f) {
                return None;
            }
            units
                .and_then(|u| decode_cf_time(v, u))
                .or_else(|| fallback_timestamp(v))
        })
        .collect()
}

/// Decode one value against a CF units string ("<unit> since <epoch>").
pub fn decode_cf_time(value: f64, units: &str) -> Option<DateTime<Utc>> {
    let (unit, epoch) = units.split_once(" since ")?;
    let seconds_per = match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" => 86_400.0,
        "hours" | "hour" => 3_600.0,
        "minutes" | "minute" => 60.0,
        "seconds" | "second" => 1.0,
        _ => return None,
    };
    let epoch = parse_epoch(epoch)?;
    let offset_ms = (value * seconds_per * 1_000.0).round();
    if !offset_ms.is_finite() || offset_ms.abs() > i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(Duration::milliseconds(offset_ms as i64))
}

/// Parse the epoch part of a CF units string.
fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    let s = s
        .trim()
        .trim_end_matches("UTC")
        .trim_end_matches("utc")
        .trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Generic fallback: interpret the raw number as seconds since the UNIX
/// epoch.
fn fallback_timestamp(value: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value as i64, 0)
}

/// Parse a textual launch-date attribute (e.g. "20150304120000").
pub fn parse_launch_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cf_days_since_argo_epoch() {
        // 1950-01-01 + 25567 days = 2020-01-01
        let dt = decode_cf_time(25_567.0, "days since 1950-01-01 00:00:00 UTC").unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_decode_cf_fractional_days() {
        let dt = decode_cf_time(0.5, "days since 1950-01-01 00:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "1950-01-01T12:00:00+00:00");
    }

    #[test]
    fn test_decode_cf_seconds_since_unix_epoch() {
        let dt = decode_cf_time(1_577_836_800.0, "seconds since 1970-01-01 00:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_decode_cf_date_only_epoch() {
        let dt = decode_cf_time(1.0, "days since 1950-01-01").unwrap();
        assert_eq!(dt.to_rfc3339(), "1950-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_decode_cf_unknown_unit() {
        assert!(decode_cf_time(1.0, "fortnights since 1950-01-01").is_none());
    }

    #[test]
    fn test_decode_cf_garbage_units() {
        assert!(decode_cf_time(1.0, "not a units string").is_none());
    }

    #[test]
    fn test_decode_values_falls_back_to_unix_timestamp() {
        let decoded = decode_time_values(&[1_577_836_800.0], Some("bogus units"), None);
        assert_eq!(
            decoded[0].unwrap().to_rfc3339(),
            "2020-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_decode_values_sentinel_is_none() {
        let decoded = decode_time_values(
            &[999_999.0, f64::NAN, 0.0],
            Some("days since 1950-01-01 00:00:00 UTC"),
            Some(999_999.0),
        );
        assert!(decoded[0].is_none());
        assert!(decoded[1].is_none());
        assert_eq!(decoded[2].unwrap().to_rfc3339(), "1950-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_launch_date_compact() {
        let dt = parse_launch_date("20150304").unwrap();
        assert_eq!(dt.to_rfc3339(), "2015-03-04T00:00:00+00:00");
        let dt = parse_launch_date("20150304123000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2015-03-04T12:30:00+00:00");
    }

    #[test]
    fn test_parse_launch_date_empty() {
        assert!(parse_launch_date("  ").is_none());
        assert!(parse_launch_date("n/a").is_none());
    }
}
