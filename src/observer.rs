//! Observer location and query time.
//!
//! Longitude is **east-positive**: west longitudes are negative, matching the
//! sign a browser's geolocation API reports. Latitude is north-positive.
//! Both are validated on construction so downstream code never sees an
//! out-of-range angle.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyguideError};

/// Validated geographic position of the observer, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    latitude_deg: f64,
    longitude_deg: f64,
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Result<Self> {
        if !latitude_deg.is_finite() || !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(SkyguideError::invalid(format!(
                "latitude {latitude_deg} outside [-90, 90]"
            )));
        }
        if !longitude_deg.is_finite() || !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(SkyguideError::invalid(format!(
                "longitude {longitude_deg} outside [-180, 180] (east-positive)"
            )));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
        })
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_deg
    }

    /// East-positive longitude.
    pub fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }
}

/// One visibility question: where and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverQuery {
    pub observer: Observer,
    pub time: DateTime<Utc>,
}

impl ObserverQuery {
    pub fn new(observer: Observer, time: DateTime<Utc>) -> Self {
        Self { observer, time }
    }

    /// Validate raw request values.
    pub fn parse(latitude_deg: f64, longitude_deg: f64, timestamp: &str) -> Result<Self> {
        let observer = Observer::new(latitude_deg, longitude_deg)?;
        let time = parse_timestamp(timestamp)?;
        Ok(Self { observer, time })
    }
}

/// Calendar years a timestamp may fall in.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parse an absolute timestamp.
///
/// Accepts RFC 3339 with `Z` or an explicit offset (what browsers send via
/// `toISOString()`), and a few offset-free forms that are taken as UTC:
/// `2024-03-08T07:56:00`, `2024-03-08 07:56:00`, fractional seconds on either,
/// and a bare date `2024-03-08` meaning midnight. The UTC year must lie in
/// [`YEAR_RANGE`].
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SkyguideError::invalid("timestamp is empty"));
    }

    let time = parse_any_format(s)
        .ok_or_else(|| SkyguideError::invalid(format!("unparseable timestamp {s:?}")))?;
    if !YEAR_RANGE.contains(&time.year()) {
        return Err(SkyguideError::invalid(format!(
            "timestamp {s:?} has year {} outside {}..={}",
            time.year(),
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        )));
    }
    Ok(time)
}

fn parse_any_format(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = Observer::new(200.0, 0.0).unwrap_err();
        assert!(matches!(err, SkyguideError::InvalidInput(_)));
        assert!(Observer::new(-90.5, 0.0).is_err());
        assert!(Observer::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(Observer::new(0.0, 180.01).is_err());
        assert!(Observer::new(0.0, -181.0).is_err());
        assert!(Observer::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_boundaries() {
        assert!(Observer::new(90.0, 180.0).is_ok());
        assert!(Observer::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn parses_browser_iso_string() {
        let t = parse_timestamp("2024-03-08T07:56:00.000Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 8, 7, 56, 0).unwrap());
    }

    #[test]
    fn applies_explicit_offset() {
        let t = parse_timestamp("2024-03-07T23:56:00-08:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 8, 7, 56, 0).unwrap());
    }

    #[test]
    fn offset_free_forms_are_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 8, 7, 56, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-08T07:56:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-08 07:56:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-03-08").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "   ", "yesterday", "2024-13-01T00:00:00Z", "08/03/2024"] {
            let err = parse_timestamp(bad).unwrap_err();
            assert!(matches!(err, SkyguideError::InvalidInput(_)), "{bad:?}");
        }
    }

    #[test]
    fn rejects_years_outside_calendar_range() {
        for far in ["+40000-03-08T07:56:00", "-0100-03-08T07:56:00", "0000-01-01"] {
            let err = parse_timestamp(far).unwrap_err();
            assert!(matches!(err, SkyguideError::InvalidInput(_)), "{far:?}");
        }
        assert!(parse_timestamp("9999-12-31T23:59:59Z").is_ok());
        assert!(parse_timestamp("0001-01-01").is_ok());
    }

    #[test]
    fn query_parse_validates_everything() {
        assert!(ObserverQuery::parse(37.0, -122.0, "2024-03-08T07:56:00Z").is_ok());
        assert!(ObserverQuery::parse(200.0, -122.0, "2024-03-08T07:56:00Z").is_err());
        assert!(ObserverQuery::parse(37.0, -122.0, "not a time").is_err());
    }
}
