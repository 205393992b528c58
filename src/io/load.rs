//! CSV file -> `RawTable`.
//!
//! This sits outside the pipeline: it only splits the file into typed cells.
//! Dates and numbers are parsed again by the core, so literal typing here is
//! a best-effort hint.
//!
//! - a UTF-8 BOM on the first header is stripped
//! - blank headers become `column_<n>`
//! - short rows are padded with nulls; surplus cells are dropped and reported
//! - unreadable records are skipped and reported, never fatal

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::{CellValue, RawTable};
use crate::error::AppError;
use crate::parse::parse_number_text;

/// A record the loader could not take as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line in the file.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

/// Load a CSV file with a header row.
pub fn load_csv_table(path: &Path) -> Result<LoadedTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let loaded = read_csv_table(file)?;
    debug!(
        path = %path.display(),
        rows = loaded.table.row_count(),
        columns = loaded.table.column_count(),
        "table loaded"
    );
    Ok(loaded)
}

/// Read CSV text with a header row from any reader.
pub fn read_csv_table<R: Read>(reader: R) -> Result<LoadedTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();
    if headers.is_empty() {
        return Err(AppError::new(2, "CSV has no header row."));
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if record.len() > headers.len() {
            row_errors.push(RowError {
                line,
                message: format!(
                    "{} cells for {} columns; extra cells ignored",
                    record.len(),
                    headers.len()
                ),
            });
        }
        rows.push(record.iter().take(headers.len()).map(type_literal).collect());
    }

    if !row_errors.is_empty() {
        warn!(count = row_errors.len(), "CSV rows with problems");
    }

    let names: Vec<&str> = headers.iter().map(String::as_str).collect();
    let table = RawTable::from_rows(&names, rows)?;
    Ok(LoadedTable {
        table,
        rows_read,
        row_errors,
    })
}

/// Best-effort literal typing of one trimmed CSV field.
///
/// Integers with a leading zero stay text so codes like `007` survive as keys.
pub fn type_literal(raw: &str) -> CellValue {
    let s = raw.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    match s.to_ascii_lowercase().as_str() {
        "true" => return CellValue::Boolean(true),
        "false" => return CellValue::Boolean(false),
        _ => {}
    }

    let digits = s.strip_prefix('-').unwrap_or(s);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if !leading_zero {
        if let Ok(v) = s.parse::<i64>() {
            return CellValue::Integer(v);
        }
        let plain = s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
        if plain {
            // `1.234` stays text so the core can reject it as ambiguous.
            if let Some(v) = s
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && parse_number_text(s).is_ok())
            {
                return CellValue::Float(v);
            }
        }
    }
    if s.len() == 10 {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return CellValue::Date(d);
        }
    }
    CellValue::Text(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnKind;

    fn read(text: &str) -> LoadedTable {
        read_csv_table(text.as_bytes()).unwrap()
    }

    #[test]
    fn literals_are_typed() {
        assert_eq!(type_literal(""), CellValue::Null);
        assert_eq!(type_literal("42"), CellValue::Integer(42));
        assert_eq!(type_literal("-1.5"), CellValue::Float(-1.5));
        assert_eq!(type_literal("007"), CellValue::text("007"));
        assert_eq!(type_literal("TRUE"), CellValue::Boolean(true));
        assert_eq!(
            type_literal("2024-01-08"),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap())
        );
        assert_eq!(type_literal("1,234.5"), CellValue::text("1,234.5"));
        assert_eq!(type_literal("nan"), CellValue::text("nan"));
        assert_eq!(type_literal("1.234"), CellValue::text("1.234"));
        assert_eq!(type_literal("0.125"), CellValue::Float(0.125));
    }

    #[test]
    fn bom_and_blank_headers() {
        let loaded = read("\u{feff}Store,,Jan-2024\nA,x,10\n");
        let headers: Vec<&str> = loaded.table.headers().collect();
        assert_eq!(headers, vec!["Store", "column_2", "Jan-2024"]);
    }

    #[test]
    fn ragged_rows_are_padded_or_trimmed() {
        let loaded = read("id,date,v\nA,2024-01-01\nB,2024-01-02,3,extra\n");
        assert_eq!(loaded.rows_read, 2);
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.table.cell(0, 2), Some(&CellValue::Null));
        assert_eq!(loaded.table.cell(1, 2), Some(&CellValue::Integer(3)));
        assert_eq!(loaded.row_errors.len(), 1);
        assert_eq!(loaded.row_errors[0].line, 3);
    }

    #[test]
    fn column_kinds_follow_the_majority() {
        let loaded = read("id,v\nA,1\nB,2.5\nC,\n");
        let kinds: Vec<ColumnKind> = loaded.table.columns().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![ColumnKind::Text, ColumnKind::Float]);
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = read_csv_table("a,a\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
