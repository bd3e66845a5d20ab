use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::tasks::DATE_FORMAT;

/// Reads the composer's date field.
///
/// Accepts `YYYY-MM-DD`, `today` / `tomorrow` / `yesterday`, day or week
/// offsets (`+3d`, `-1w`, `2d`), and weekday names (`fri`, `next fri`).
/// Weekday names resolve to the next such day, today included unless
/// prefixed with `next`.
pub(crate) fn parse_date_input(input: &str, base: NaiveDate) -> Option<NaiveDate> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&trimmed, DATE_FORMAT) {
        return Some(date);
    }

    match trimmed.as_str() {
        "today" => return Some(base),
        "tomorrow" => return base.succ_opt(),
        "yesterday" => return base.pred_opt(),
        _ => {}
    }

    parse_offset(&trimmed, base).or_else(|| parse_weekday_phrase(&trimmed, base))
}

fn parse_offset(input: &str, base: NaiveDate) -> Option<NaiveDate> {
    let (sign, rest) = match input.as_bytes().first()? {
        b'+' => (1, &input[1..]),
        b'-' => (-1, &input[1..]),
        _ => (1, input),
    };
    let unit = rest.chars().last()?;
    let qty: i64 = rest[..rest.len() - unit.len_utf8()].parse().ok()?;
    let qty = qty.checked_mul(sign)?;

    let delta = match unit {
        'd' => Duration::try_days(qty)?,
        'w' => Duration::try_weeks(qty)?,
        _ => return None,
    };
    base.checked_add_signed(delta)
}

fn parse_weekday_phrase(input: &str, base: NaiveDate) -> Option<NaiveDate> {
    let mut words = input.split_whitespace();
    let (force_next, name) = match (words.next()?, words.next(), words.next()) {
        ("next", Some(name), None) => (true, name),
        (name, None, None) => (false, name),
        _ => return None,
    };
    let weekday = parse_weekday(name)?;

    let mut delta = (weekday.num_days_from_monday() as i64
        - base.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    if force_next && delta == 0 {
        delta = 7;
    }
    base.checked_add_signed(Duration::days(delta))
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    const NAMES: [(&str, Weekday); 7] = [
        ("mon", Weekday::Mon),
        ("tue", Weekday::Tue),
        ("wed", Weekday::Wed),
        ("thu", Weekday::Thu),
        ("fri", Weekday::Fri),
        ("sat", Weekday::Sat),
        ("sun", Weekday::Sun),
    ];
    NAMES
        .iter()
        .find(|(prefix, _)| token.starts_with(prefix))
        .map(|(_, day)| *day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap() // Wed
    }

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_date_input("Today", base()), Some(base()));
        assert_eq!(
            parse_date_input("tomorrow", base()),
            Some(base() + Duration::days(1))
        );
        assert_eq!(
            parse_date_input("yesterday", base()),
            Some(base() - Duration::days(1))
        );
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(
            parse_date_input("+3d", base()),
            Some(base() + Duration::days(3))
        );
        assert_eq!(parse_date_input("2w", base()), Some(base() + Duration::weeks(2)));
        assert_eq!(
            parse_date_input("-1w", base()),
            Some(base() - Duration::weeks(1))
        );
        assert_eq!(parse_date_input("+3m", base()), None);
        assert_eq!(parse_date_input("+d", base()), None);
    }

    #[test]
    fn huge_offsets_are_rejected_instead_of_overflowing() {
        assert_eq!(parse_date_input("+99999999999d", base()), None);
        assert_eq!(parse_date_input("+9999999999999999d", base()), None);
        assert_eq!(parse_date_input("-9999999999999999w", base()), None);
        assert_eq!(parse_date_input("99999999999999999999d", base()), None);
        assert_eq!(parse_date_input("tomorrow", NaiveDate::MAX), None);
        assert_eq!(parse_date_input("sun", NaiveDate::MAX), None);
    }

    #[test]
    fn parses_weekdays() {
        let next_mon = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(parse_date_input("monday", base()), Some(next_mon));
        assert_eq!(parse_date_input("wed", base()), Some(base()));
        assert_eq!(
            parse_date_input("next wed", base()),
            Some(base() + Duration::days(7))
        );
        assert_eq!(parse_date_input("next", base()), None);
    }

    #[test]
    fn parses_explicit_date_and_rejects_garbage() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
        assert_eq!(parse_date_input("2025-02-02", base()), Some(date));
        assert_eq!(parse_date_input("2025-02-30", base()), None);
        assert_eq!(parse_date_input("soon", base()), None);
        assert_eq!(parse_date_input("   ", base()), None);
    }
}
