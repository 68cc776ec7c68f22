use chrono::{DateTime, NaiveDateTime};

/// Exchange-style timestamp, e.g. `16-Oct-2026 15:30:00`.
const EXCHANGE_TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S";
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round to `decimals` places, halves away from zero.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Parse a server timestamp into exchange wall-clock time.
/// RFC 3339 inputs keep their local time and drop the offset.
pub fn parse_server_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, EXCHANGE_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, ISO_TIMESTAMP_FORMAT))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn rounds_halves_away_from_zero() {
        assert_eq!(round_to(1.25, 1), 1.3);
        assert_eq!(round_to(-1.25, 1), -1.3);
        assert_eq!(round_to(0.04, 1), 0.0);
        assert_eq!(round_to(22153.456, 2), 22153.46);
    }

    #[test]
    fn parses_exchange_and_iso_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        assert_eq!(parse_server_timestamp("16-Oct-2026 15:30:00"), Some(expected));
        assert_eq!(parse_server_timestamp("2026-10-16 15:30:00"), Some(expected));
        assert_eq!(parse_server_timestamp("2026-10-16T15:30:00+05:30"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_server_timestamp("market closed"), None);
        assert_eq!(parse_server_timestamp(""), None);
        assert!(parse_server_timestamp("16-Oct-2026 09:15:00").is_some_and(|t| t.hour() == 9));
    }
}
