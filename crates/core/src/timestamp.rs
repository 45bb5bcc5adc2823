//! Combining separate date and time-of-day fields into one instant.
//!
//! Nothing here fails: values that cannot be understood become `None`
//! (for dates) or midnight (for times of day).

use time::macros::format_description;
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::table::Cell;

/// `YYYY-MM-DD HH:MM:SS`, the form instants take in output records.
pub fn format_instant(dt: PrimitiveDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| format!("{} {}", dt.date(), dt.time()))
}

/// Date field + time-of-day field → instant.
///
/// A missing or unusable date gives `None`. A missing or garbled time of day
/// counts as midnight. A date field that already carries a time keeps it and
/// the time of day is added on top.
pub fn combine(date: &Cell, time_of_day: &Cell) -> Option<PrimitiveDateTime> {
    let base = date_value(date)?;
    let offset = time_of_day_offset(time_of_day);
    base.checked_add(offset)
}

/// Interpret a cell as a calendar instant.
pub fn date_value(cell: &Cell) -> Option<PrimitiveDateTime> {
    match cell {
        Cell::Date(d) => Some(d.midnight()),
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(s) => parse_date_text(s),
        _ => None,
    }
}

/// Interpret a cell as an offset from midnight; anything unusable is zero.
pub fn time_of_day_offset(cell: &Cell) -> Duration {
    match cell {
        Cell::Time(t) => since_midnight(*t),
        Cell::DateTime(dt) => since_midnight(dt.time()),
        Cell::Text(s) => parse_time_text(s).unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn since_midnight(t: Time) -> Duration {
    Duration::hours(i64::from(t.hour()))
        + Duration::minutes(i64::from(t.minute()))
        + Duration::seconds(i64::from(t.second()))
        + Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Accepted date text, tried in order:
/// - `YYYY-MM-DD` / `YYYY/MM/DD`
/// - `MM/DD/YYYY`
///
/// optionally followed by `T` or a space and a time of day, which may end in
/// `Z` or a `±HH:MM` offset. Offsets are dropped; the wall-clock time is kept.
fn parse_date_text(raw: &str) -> Option<PrimitiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let (date_part, time_part) = match s.find(['T', ' ']) {
        Some(idx) => (&s[..idx], Some(s[idx + 1..].trim())),
        None => (s, None),
    };

    let date = parse_calendar_date(date_part)?;
    let time = match time_part {
        Some(t) if !t.is_empty() => parse_time_text(strip_zone(t))?,
        _ => Duration::ZERO,
    };
    date.midnight().checked_add(time)
}

fn parse_calendar_date(s: &str) -> Option<Date> {
    let parts: Vec<&str> = s.split(['-', '/']).collect();
    if parts.len() != 3 {
        return None;
    }
    let nums: Vec<i32> = parts
        .iter()
        .map(|p| p.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (year, month, day) = if parts[0].len() == 4 {
        (nums[0], nums[1], nums[2])
    } else if parts[2].len() == 4 {
        (nums[2], nums[0], nums[1])
    } else {
        return None;
    };
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

/// Drop a trailing `Z` or `±HH:MM` / `±HHMM` zone designator.
fn strip_zone(t: &str) -> &str {
    let t = t.trim_end_matches(['Z', 'z']);
    match t.rfind(['+', '-']) {
        Some(idx) if idx > 0 => &t[..idx],
        _ => t,
    }
}

/// `H:M[:S]`, with everything but digits and colons stripped first and any
/// fractional seconds ignored. Returns `None` when the text is not a time.
fn parse_time_text(raw: &str) -> Option<Duration> {
    let whole_seconds = raw.split('.').next().unwrap_or("");
    let cleaned: String = whole_seconds
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let parts: Vec<&str> = cleaned.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut values = [0i64; 3];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    let [h, m, sec] = values;
    if h > 23 || m > 59 || sec > 59 {
        return None;
    }
    Some(Duration::hours(h) + Duration::minutes(m) + Duration::seconds(sec))
}
