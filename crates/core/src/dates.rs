use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parse a date-like string in any of the shapes upstream APIs emit.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.f]`
/// (also with a space separator), `YYYY/MM/DD`, `DD/MM/YYYY`, `YYYY-MM`
/// (first of month) and a bare `YYYY` (January 1st). Surrounding whitespace
/// is ignored. Returns `None` when nothing matches.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y/%m/%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(date);
    }
    if let Some(date) = parse_year_month(value) {
        return Some(date);
    }
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        let year = value.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Parse `YYYY-MM` into the first day of that month.
fn parse_year_month(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Calendar quarter (1-4) of a date: `floor(month0 / 3) + 1`.
pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// Quarter key in the `YYYY-Qn` form used for partition file names.
///
/// Keys of four-digit years sort lexically in chronological order.
pub fn quarter_key(date: NaiveDate) -> String {
    format!("{:04}-Q{}", date.year(), quarter_of(date))
}

/// Parse a `YYYY-Qn` key back into `(year, quarter)`.
pub fn parse_quarter_key(key: &str) -> Option<(i32, u32)> {
    let (year, quarter) = key.split_once("-Q")?;
    if year.len() != 4 || quarter.len() != 1 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    let quarter = quarter.parse::<u32>().ok()?;
    (1..=4).contains(&quarter).then_some((year, quarter))
}

/// Inclusive date range, serialized as `{"start": "...", "end": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Smallest range covering every date, or `None` for an empty input.
    pub fn covering<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        dates.into_iter().fold(None, |acc, date| match acc {
            None => Some(Self {
                start: date,
                end: date,
            }),
            Some(range) => Some(Self {
                start: range.start.min(date),
                end: range.end.max(date),
            }),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
