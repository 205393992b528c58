//! Date and period-label parsing.
//!
//! Cell values accept full dates (a few common layouts, datetimes truncated to
//! the date) and period labels such as `2024-01`, `Jan-2024`, `2024-Q1` or
//! `2024-W05`. Headers additionally accept bare years and fiscal-year codes,
//! which would be too easy to confuse with plain numbers inside a column.
//!
//! Periods normalize to their first day. Day-first wins over month-first for
//! slash and dash layouts (`01/02/2024` is 1 February).

use chrono::{Datelike, NaiveDate, Weekday};

use super::{CellFailure, CellParse};
use crate::domain::CellValue;

const FULL_DATE_FORMATS: [&str; 14] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1800..=2200;

/// Parse a cell into a calendar date.
pub fn parse_date_cell(value: &CellValue) -> CellParse<NaiveDate> {
    match value {
        CellValue::Null => Err(CellFailure::Missing),
        CellValue::Date(d) => Ok(*d),
        CellValue::Text(s) if s.trim().is_empty() => Err(CellFailure::Missing),
        CellValue::Text(s) => parse_date_text(s).ok_or(CellFailure::Invalid),
        // Loaders type `20240131` as an integer.
        CellValue::Integer(v) if (10_000_000..=99_999_999).contains(v) => {
            parse_compact_ymd(&v.to_string())
                .filter(|d| YEAR_RANGE.contains(&d.year()))
                .ok_or(CellFailure::Invalid)
        }
        CellValue::Integer(_) | CellValue::Float(_) | CellValue::Boolean(_) => {
            Err(CellFailure::Invalid)
        }
    }
}

/// `true` if the cell holds something `parse_date_cell` accepts.
pub fn is_date_cell(value: &CellValue) -> bool {
    parse_date_cell(value).is_ok()
}

/// Parse a column header as a date or period label.
pub fn parse_header_date(header: &str) -> Option<NaiveDate> {
    let s = header.trim();
    parse_date_text(s)
        .or_else(|| parse_fiscal_year(s))
        .or_else(|| parse_bare_year(s))
}

/// Parse free text as a full date or a period label.
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_full_date(s)
        .or_else(|| parse_datetime_prefix(s))
        .or_else(|| parse_period(s))
        .filter(|d| YEAR_RANGE.contains(&d.year()))
}

fn parse_full_date(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_compact_ymd(s) {
        return Some(d);
    }
    FULL_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .filter(|d| YEAR_RANGE.contains(&d.year()))
}

/// `20240131`.
fn parse_compact_ymd(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `2024-01-31T10:00:00`, `2024-01-31 10:00`.
fn parse_datetime_prefix(s: &str) -> Option<NaiveDate> {
    if s.len() <= 10 || !s.is_char_boundary(10) {
        return None;
    }
    let (date, rest) = s.split_at(10);
    if !rest.starts_with(['T', ' ']) {
        return None;
    }
    parse_full_date(date)
}

fn parse_period(s: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = s
        .split(['-', '/', ' ', '_'])
        .filter(|t| !t.is_empty())
        .collect();
    match tokens.as_slice() {
        [single] => parse_compact_period(single),
        [a, b] => parse_pair(a, b).or_else(|| parse_pair_reversed(a, b)),
        _ => None,
    }
}

/// `2024Q1`, `2024M01`, `2024W05`.
fn parse_compact_period(token: &str) -> Option<NaiveDate> {
    if token.len() < 6 || !token.is_char_boundary(4) || !token.is_char_boundary(5) {
        return None;
    }
    let year = parse_year4(&token[..4])?;
    let marker = token[4..5].to_ascii_uppercase();
    let number = &token[5..];
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = number.parse().ok()?;
    match marker.as_str() {
        "Q" => quarter_start(year, number),
        "M" => NaiveDate::from_ymd_opt(year, number, 1),
        "W" => NaiveDate::from_isoywd_opt(year, number, Weekday::Mon),
        _ => None,
    }
}

/// Year first: `2024-01`, `2024 Q1`, `2024-W05`.
fn parse_pair(a: &str, b: &str) -> Option<NaiveDate> {
    let year = parse_year4(a)?;
    if let Some(month) = parse_month_number(b).or_else(|| month_from_name(b)) {
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(q) = strip_marker(b, 'Q') {
        return quarter_start(year, q);
    }
    if let Some(w) = strip_marker(b, 'W') {
        return NaiveDate::from_isoywd_opt(year, w, Weekday::Mon);
    }
    None
}

/// Year last: `01/2024`, `Jan-2024`, `Jan-24`, `Q1 2024`.
fn parse_pair_reversed(a: &str, b: &str) -> Option<NaiveDate> {
    if let Some(month) = month_from_name(a) {
        let year = parse_year4(b).or_else(|| parse_year2(b))?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    let year = parse_year4(b)?;
    if let Some(month) = parse_month_number(a) {
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(q) = strip_marker(a, 'Q') {
        return quarter_start(year, q);
    }
    None
}

/// `FY2024`, `FY24`, `FY 2024`.
fn parse_fiscal_year(s: &str) -> Option<NaiveDate> {
    let upper = s.to_ascii_uppercase();
    let rest = upper.strip_prefix("FY")?.trim_start_matches([' ', '-']);
    let year = parse_year4(rest).or_else(|| parse_year2(rest))?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn parse_bare_year(s: &str) -> Option<NaiveDate> {
    let year = parse_year4(s)?;
    (1900..=2100)
        .contains(&year)
        .then(|| NaiveDate::from_ymd_opt(year, 1, 1))
        .flatten()
}

fn parse_year4(s: &str) -> Option<i32> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s.parse().ok()?;
    YEAR_RANGE.contains(&year).then_some(year)
}

fn parse_year2(s: &str) -> Option<i32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i32>().ok().map(|yy| 2000 + yy)
}

fn parse_month_number(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u32 = s.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

/// `Jan`, `jan`, `January`, `Sept`.
pub fn month_from_name(s: &str) -> Option<u32> {
    let lower = s.trim_end_matches('.').to_ascii_lowercase();
    if lower == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|name| lower == *name || (lower.len() == 3 && name.starts_with(lower.as_str())))
        .map(|idx| idx as u32 + 1)
}

fn strip_marker(s: &str, marker: char) -> Option<u32> {
    let rest = s
        .strip_prefix(marker)
        .or_else(|| s.strip_prefix(marker.to_ascii_lowercase()))?;
    if rest.is_empty() || rest.len() > 2 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

fn quarter_start(year: i32, quarter: u32) -> Option<NaiveDate> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn full_date_layouts() {
        assert_eq!(parse_date_text("2024-01-08"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("2024/01/08"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("08/01/2024"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("12/31/2024"), Some(ymd(2024, 12, 31)));
        assert_eq!(parse_date_text("20240108"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("8 Jan 2024"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("2024-01-08T13:45:00"), Some(ymd(2024, 1, 8)));
        assert_eq!(parse_date_text("2024-01-08 13:45"), Some(ymd(2024, 1, 8)));
    }

    #[test]
    fn period_labels_start_on_first_day() {
        assert_eq!(parse_date_text("2024-02"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("02/2024"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("Feb-2024"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("February 2024"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("Feb-24"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("2024M02"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date_text("2024-Q3"), Some(ymd(2024, 7, 1)));
        assert_eq!(parse_date_text("Q3 2024"), Some(ymd(2024, 7, 1)));
        assert_eq!(parse_date_text("2024q4"), Some(ymd(2024, 10, 1)));
        assert_eq!(parse_date_text("2024-W01"), Some(ymd(2024, 1, 1)));
    }

    #[test]
    fn rejects_non_dates() {
        for s in ["", "Store", "sales", "wk1", "12.5", "1-2", "2024", "2024.5", "Q5 2024", "2024-13"] {
            assert_eq!(parse_date_text(s), None, "{s}");
        }
    }

    #[test]
    fn headers_accept_years_and_fiscal_codes() {
        assert_eq!(parse_header_date("2023"), Some(ymd(2023, 1, 1)));
        assert_eq!(parse_header_date("FY2024"), Some(ymd(2024, 1, 1)));
        assert_eq!(parse_header_date("FY24"), Some(ymd(2024, 1, 1)));
        assert_eq!(parse_header_date("Jan-2024"), Some(ymd(2024, 1, 1)));
        assert_eq!(parse_header_date("Store"), None);
        assert_eq!(parse_header_date("1234567"), None);
    }

    #[test]
    fn cells_distinguish_missing_from_invalid() {
        assert_eq!(parse_date_cell(&CellValue::Null), Err(CellFailure::Missing));
        assert_eq!(parse_date_cell(&CellValue::text("  ")), Err(CellFailure::Missing));
        assert_eq!(parse_date_cell(&CellValue::text("soon")), Err(CellFailure::Invalid));
        assert_eq!(parse_date_cell(&CellValue::Integer(2024)), Err(CellFailure::Invalid));
        assert_eq!(parse_date_cell(&CellValue::Float(20240131.0)), Err(CellFailure::Invalid));
        assert_eq!(
            parse_date_cell(&CellValue::Date(ymd(2024, 3, 1))),
            Ok(ymd(2024, 3, 1))
        );
    }

    #[test]
    fn compact_integers_are_dates() {
        assert_eq!(parse_date_cell(&CellValue::Integer(20240131)), Ok(ymd(2024, 1, 31)));
        assert_eq!(parse_date_cell(&CellValue::Integer(20241301)), Err(CellFailure::Invalid));
        assert_eq!(parse_date_cell(&CellValue::Integer(12345678)), Err(CellFailure::Invalid));
        assert_eq!(parse_date_cell(&CellValue::Integer(-20240131)), Err(CellFailure::Invalid));
    }

    #[test]
    fn month_names() {
        assert_eq!(month_from_name("Jan"), Some(1));
        assert_eq!(month_from_name("sept"), Some(9));
        assert_eq!(month_from_name("Dec."), Some(12));
        assert_eq!(month_from_name("December"), Some(12));
        assert_eq!(month_from_name("Ja"), None);
        assert_eq!(month_from_name("Sales"), None);
    }
}
