use chrono::{DateTime, Utc};

use crate::entities::car_rental::DurationType;

const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Number of billing units between `start` and `end`.
///
/// Zero when `end <= start`. Otherwise the elapsed time is rounded up to
/// whole hours or days, with at least one unit billed.
pub fn rental_duration(start: DateTime<Utc>, end: DateTime<Utc>, kind: DurationType) -> i64 {
    let elapsed_ms = (end - start).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }

    let unit_ms = match kind {
        DurationType::Hourly => MS_PER_HOUR,
        DurationType::Daily => MS_PER_DAY,
    };

    // ceil division on positive integers
    let units = (elapsed_ms + unit_ms - 1) / unit_ms;
    units.max(1)
}

/// Same as [`rental_duration`] for RFC 3339 inputs; unparseable dates give zero
pub fn rental_duration_str(start: &str, end: &str, kind: DurationType) -> i64 {
    match (parse_instant(start), parse_instant(end)) {
        (Some(start), Some(end)) => rental_duration(start, end, kind),
        _ => 0,
    }
}

pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Price rounded to a whole currency unit
pub fn rental_price(unit_rate: f64, duration: i64) -> f64 {
    (unit_rate * duration as f64).round()
}

/// Whether two half-open windows `[start, end)` overlap
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn same_instant_is_zero() {
        assert_eq!(rental_duration(start(), start(), DurationType::Hourly), 0);
        assert_eq!(rental_duration(start(), start(), DurationType::Daily), 0);
    }

    #[test]
    fn end_before_start_is_zero() {
        let end = start() - Duration::hours(3);
        assert_eq!(rental_duration(start(), end, DurationType::Hourly), 0);
    }

    #[test]
    fn partial_hours_round_up() {
        let end = start() + Duration::minutes(61);
        assert_eq!(rental_duration(start(), end, DurationType::Hourly), 2);

        let end = start() + Duration::minutes(60);
        assert_eq!(rental_duration(start(), end, DurationType::Hourly), 1);
    }

    #[test]
    fn partial_days_round_up() {
        let end = start() + Duration::hours(25);
        assert_eq!(rental_duration(start(), end, DurationType::Daily), 2);
    }

    #[test]
    fn short_rental_bills_one_unit() {
        let end = start() + Duration::seconds(1);
        assert_eq!(rental_duration(start(), end, DurationType::Hourly), 1);
        assert_eq!(rental_duration(start(), end, DurationType::Daily), 1);
    }

    #[test]
    fn unparseable_dates_give_zero() {
        assert_eq!(
            rental_duration_str("tomorrow", "2024-03-02T09:00:00Z", DurationType::Daily),
            0
        );
        assert_eq!(
            rental_duration_str("2024-03-01T09:00:00Z", "", DurationType::Daily),
            0
        );
        assert_eq!(
            rental_duration_str(
                "2024-03-01T09:00:00Z",
                "2024-03-01T11:30:00+00:00",
                DurationType::Hourly
            ),
            3
        );
    }

    #[test]
    fn price_rounds_to_whole_units() {
        assert_eq!(rental_price(12.4, 3), 37.0);
        assert_eq!(rental_price(12.5, 1), 13.0);
        assert_eq!(rental_price(45_000.0, 2), 90_000.0);
    }

    #[test]
    fn overlap_is_half_open() {
        let a_end = start() + Duration::hours(2);
        assert!(windows_overlap(start(), a_end, start() + Duration::hours(1), a_end + Duration::hours(1)));
        assert!(!windows_overlap(start(), a_end, a_end, a_end + Duration::hours(1)));
    }
}
