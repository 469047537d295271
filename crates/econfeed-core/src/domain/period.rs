use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};

use crate::ValidationError;

/// Canonical `YYYY-MM-DD` layout shared by requests, responses and cache keys.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<Date, ValidationError> {
    Date::parse(value.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: value.to_owned(),
    })
}

/// Render a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

/// Map a provider period label onto the first day of that period.
///
/// Accepted shapes: `2023` (year), `2023-01` (month), `2023Q1` / `2023-Q1`
/// (quarter), `2023M01` (month), `2023S1` / `2023-S2` (half year), `202301`
/// (compact month) and `2023-01-15` (date, anything after the first ten
/// characters is ignored). Returns `None` for anything else.
pub fn parse_period(raw: &str) -> Option<Date> {
    let value = raw.trim().to_ascii_uppercase();
    if !value.is_ascii() {
        return None;
    }

    if value.len() == 4 {
        return first_of_month(parse_year(&value)?, 1);
    }

    if value.len() == 7 && value.as_bytes()[4] == b'-' && all_digits(&value[5..]) {
        return first_of_month(parse_year(&value[..4])?, value[5..].parse().ok()?);
    }

    if let Some((year, quarter)) = value.split_once('Q') {
        let quarter: u8 = quarter.parse().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        return first_of_month(parse_year(year.trim_end_matches('-'))?, (quarter - 1) * 3 + 1);
    }

    if let Some((year, month)) = value.split_once('M') {
        return first_of_month(parse_year(year.trim_end_matches('-'))?, month.parse().ok()?);
    }

    if let Some((year, half)) = value.split_once('S') {
        let month = match half.parse::<u8>().ok()? {
            1 => 1,
            2 => 7,
            _ => return None,
        };
        return first_of_month(parse_year(year.trim_end_matches('-'))?, month);
    }

    if value.len() == 6 && all_digits(&value) {
        return first_of_month(parse_year(&value[..4])?, value[4..].parse().ok()?);
    }

    parse_date(value.get(..10)?).ok()
}

fn parse_year(value: &str) -> Option<i32> {
    if value.len() != 4 || !all_digits(value) {
        return None;
    }
    value.parse().ok()
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn first_of_month(year: i32, month: u8) -> Option<Date> {
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, 1).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u8, day: u8) -> Date {
        Date::from_calendar_date(year, Month::try_from(month).expect("month"), day).expect("date")
    }

    #[test]
    fn period_shapes_map_to_first_day() {
        assert_eq!(parse_period("2023"), Some(ymd(2023, 1, 1)));
        assert_eq!(parse_period("2023-01"), Some(ymd(2023, 1, 1)));
        assert_eq!(parse_period("2023Q1"), Some(ymd(2023, 1, 1)));
        assert_eq!(parse_period("2023M01"), Some(ymd(2023, 1, 1)));
        assert_eq!(parse_period("2023-01-15"), Some(ymd(2023, 1, 15)));
    }

    #[test]
    fn quarter_maps_to_its_first_month() {
        assert_eq!(parse_period("2021Q2"), Some(ymd(2021, 4, 1)));
        assert_eq!(parse_period("2021-Q3"), Some(ymd(2021, 7, 1)));
        assert_eq!(parse_period("2021q4"), Some(ymd(2021, 10, 1)));
        assert_eq!(parse_period("2021Q5"), None);
    }

    #[test]
    fn half_years_compact_months_and_timestamps_are_understood() {
        assert_eq!(parse_period("2022S2"), Some(ymd(2022, 7, 1)));
        assert_eq!(parse_period("2022-S1"), Some(ymd(2022, 1, 1)));
        assert_eq!(parse_period("202211"), Some(ymd(2022, 11, 1)));
        assert_eq!(parse_period("2022-11-30T00:00:00Z"), Some(ymd(2022, 11, 30)));
    }

    #[test]
    fn garbage_is_rejected_without_panicking() {
        for raw in ["", "20", "abcd", "2023-13", "2023M13", "2023-02-30", "Q1", "ÅÅÅÅ"] {
            assert_eq!(parse_period(raw), None, "input {raw:?}");
        }
    }

    #[test]
    fn strict_dates_reject_partial_input() {
        assert_eq!(parse_date("2020-03-01"), Ok(ymd(2020, 3, 1)));
        assert!(parse_date("2020-3-1").is_err());
        assert!(parse_date("2020").is_err());
        assert!(parse_date("2020-03-01T00:00").is_err());
        assert!(parse_date("2021-02-29").is_err());
        assert_eq!(format_date(ymd(2020, 3, 1)), "2020-03-01");
    }
}
