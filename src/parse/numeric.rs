//! Locale-agnostic numeric parsing.
//!
//! Accepts `.` or `,` as the decimal mark. Thousands separators (`,` `.`
//! space, NBSP, `'`) and a leading or trailing currency symbol are stripped
//! only when the grouping is well formed and the reading is unique. `1,234`
//! and `1.234` could be either 1234 or 1.234, so both are rejected.

use super::{CellFailure, CellParse};
use crate::domain::CellValue;

const CURRENCY_PREFIXES: [&str; 14] = [
    "US$", "R$", "A$", "C$", "$", "€", "£", "¥", "₹", "₩", "₽", "₺", "₪", "₫",
];
const GROUP_CHARS: [char; 5] = [',', '.', ' ', '\u{a0}', '\''];

/// Parse a cell into a finite `f64`.
pub fn parse_number_cell(value: &CellValue) -> CellParse<f64> {
    match value {
        CellValue::Null => Err(CellFailure::Missing),
        CellValue::Integer(v) => Ok(*v as f64),
        CellValue::Float(v) if v.is_finite() => Ok(*v),
        CellValue::Float(_) => Err(CellFailure::NonFinite),
        CellValue::Text(s) => parse_number_text(s),
        CellValue::Boolean(_) | CellValue::Date(_) => Err(CellFailure::Invalid),
    }
}

/// `true` if the cell holds something `parse_number_cell` accepts.
pub fn is_number_cell(value: &CellValue) -> bool {
    parse_number_cell(value).is_ok()
}

pub fn parse_number_text(raw: &str) -> CellParse<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(CellFailure::Missing);
    }

    let (negative, body) = split_sign_and_currency(s).ok_or(CellFailure::Invalid)?;
    let normalized = normalize_digits(body).ok_or(CellFailure::Invalid)?;

    let value: f64 = normalized.parse().map_err(|_| CellFailure::Invalid)?;
    if !value.is_finite() {
        return Err(CellFailure::NonFinite);
    }
    Ok(if negative { -value } else { value })
}

/// Strip sign and currency in any of the forms `-$5`, `$-5`, `5 €`, `-5€`.
fn split_sign_and_currency(s: &str) -> Option<(bool, &str)> {
    let mut body = s;
    let mut negative = false;
    let mut signed = false;

    if let Some(rest) = strip_sign(body, &mut negative) {
        body = rest.trim_start();
        signed = true;
    }
    if let Some(rest) = CURRENCY_PREFIXES.iter().find_map(|c| body.strip_prefix(c)) {
        body = rest.trim_start();
        if !signed {
            if let Some(rest) = strip_sign(body, &mut negative) {
                body = rest.trim_start();
            }
        }
    } else if let Some(rest) = CURRENCY_PREFIXES.iter().find_map(|c| body.strip_suffix(c)) {
        body = rest.trim_end();
    }

    (!body.is_empty()).then_some((negative, body))
}

fn strip_sign<'a>(s: &'a str, negative: &mut bool) -> Option<&'a str> {
    if let Some(rest) = s.strip_prefix('-') {
        *negative = true;
        Some(rest)
    } else {
        s.strip_prefix('+')
    }
}

/// Rewrite `body` into a plain `digits[.digits][e±digits]` string.
fn normalize_digits(body: &str) -> Option<String> {
    if body.contains(['e', 'E']) {
        return normalize_scientific(body);
    }
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || GROUP_CHARS.contains(&c))
    {
        return None;
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();
    let decimal = match (dots, commas) {
        (0, 0) => None,
        (1, 0) if mark_reads_both_ways(body, '.') => return None,
        (1, 0) => Some('.'),
        (_, 0) => None,
        (0, 1) if mark_reads_both_ways(body, ',') => return None,
        (0, 1) => Some(','),
        (0, _) => None,
        _ => {
            // Both present: the last one is the decimal mark and must be unique.
            let last = body.rfind(['.', ','])?;
            let mark = body[last..].chars().next()?;
            let count = if mark == '.' { dots } else { commas };
            if count != 1 {
                return None;
            }
            Some(mark)
        }
    };

    let (int_part, frac_part) = match decimal {
        Some(mark) => {
            let idx = body.find(mark)?;
            (&body[..idx], &body[idx + mark.len_utf8()..])
        }
        None => (body, ""),
    };

    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int_digits = ungroup(int_part)?;
    if int_digits.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut out = if int_digits.is_empty() {
        "0".to_string()
    } else {
        int_digits
    };
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    Some(out)
}

/// A single `mark` followed by exactly three digits after a short integer
/// group reads both as a thousands separator and as a decimal mark.
fn mark_reads_both_ways(body: &str, mark: char) -> bool {
    let Some((int_part, frac_part)) = body.split_once(mark) else {
        return false;
    };
    frac_part.len() == 3
        && frac_part.bytes().all(|b| b.is_ascii_digit())
        && !int_part.is_empty()
        && int_part.len() <= 3
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && !int_part.starts_with('0')
}

/// Remove one kind of thousands separator, checking `d{1,3}(sep d{3})*`.
fn ungroup(int_part: &str) -> Option<String> {
    let separators: Vec<char> = GROUP_CHARS
        .iter()
        .copied()
        .filter(|c| int_part.contains(*c))
        .collect();
    match separators.as_slice() {
        [] => Some(int_part.to_string()),
        [sep] => {
            let groups: Vec<&str> = int_part.split(*sep).collect();
            let (first, rest) = groups.split_first()?;
            let first_ok = (1..=3).contains(&first.len()) && first.bytes().all(|b| b.is_ascii_digit());
            let rest_ok = rest
                .iter()
                .all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()));
            (first_ok && rest_ok).then(|| groups.concat())
        }
        _ => None,
    }
}

fn normalize_scientific(body: &str) -> Option<String> {
    let (mantissa, exponent) = body.split_once(['e', 'E'])?;
    let exponent = exponent.strip_prefix('+').unwrap_or(exponent);
    let exp_digits = exponent.strip_prefix('-').unwrap_or(exponent);
    if exp_digits.is_empty() || !exp_digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits_ok = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits_ok(int_part) || !digits_ok(frac_part) || (int_part.is_empty() && frac_part.is_empty()) {
        return None;
    }
    Some(format!("{mantissa}e{exponent}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> f64 {
        parse_number_text(s).unwrap()
    }

    #[test]
    fn plain_and_decimal_forms() {
        assert_eq!(num("100"), 100.0);
        assert_eq!(num(" 12.5 "), 12.5);
        assert_eq!(num("12,5"), 12.5);
        assert_eq!(num("0,125"), 0.125);
        assert_eq!(num("0.125"), 0.125);
        assert_eq!(num("12.3456"), 12.3456);
        assert_eq!(num("-3"), -3.0);
        assert_eq!(num("+3.25"), 3.25);
        assert_eq!(num(".5"), 0.5);
        assert_eq!(num("1e3"), 1000.0);
        assert_eq!(num("2.5E-1"), 0.25);
    }

    #[test]
    fn grouping_and_currency() {
        assert_eq!(num("1,234.56"), 1234.56);
        assert_eq!(num("1.234,56"), 1234.56);
        assert_eq!(num("1,234,567"), 1_234_567.0);
        assert_eq!(num("1.234.567"), 1_234_567.0);
        assert_eq!(num("1 234,5"), 1234.5);
        assert_eq!(num("1'234.5"), 1234.5);
        assert_eq!(num("$1,234.50"), 1234.5);
        assert_eq!(num("-$5"), -5.0);
        assert_eq!(num("$-5"), -5.0);
        assert_eq!(num("12.50 €"), 12.5);
        assert_eq!(num("R$ 1.234,00"), 1234.0);
    }

    #[test]
    fn ambiguous_or_malformed_is_invalid() {
        for s in ["1,234", "1.234", "$12.500", "1,2,3", "1.234.56", "1,234,56.7", "abc", "NaN", "inf", "12%", "(5)", "$", "1 234 567,1.5", "--5", "1e"] {
            assert_eq!(parse_number_text(s), Err(CellFailure::Invalid), "{s}");
        }
    }

    #[test]
    fn overflow_is_non_finite() {
        assert_eq!(parse_number_text("1e400"), Err(CellFailure::NonFinite));
        assert_eq!(parse_number_cell(&CellValue::Float(f64::NAN)), Err(CellFailure::NonFinite));
    }

    #[test]
    fn cells() {
        assert_eq!(parse_number_cell(&CellValue::Integer(7)), Ok(7.0));
        assert_eq!(parse_number_cell(&CellValue::Null), Err(CellFailure::Missing));
        assert_eq!(parse_number_cell(&CellValue::text("")), Err(CellFailure::Missing));
        assert_eq!(parse_number_cell(&CellValue::Boolean(true)), Err(CellFailure::Invalid));
    }
}
