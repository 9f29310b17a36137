// src/storage/table.rs

//! Delimiter-separated rendering of an Output Set.
//!
//! Every record becomes one row under a header of all columns. Cells of
//! integer columns that a record lacks are rendered as `0`, other missing
//! cells stay empty.

use std::io::{self, Write};

use crate::models::{ExportFormat, FieldValue, Record};

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row to any writer.
pub fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Whether any record holds an integer under `column`.
fn is_numeric_column(column: &str, records: &[Record]) -> bool {
    records
        .iter()
        .any(|r| matches!(r.get(column), Some(FieldValue::Integer(_))))
}

/// Build the cell rows (header excluded) for `columns`.
pub fn build_rows(columns: &[String], records: &[Record]) -> Vec<Vec<String>> {
    let numeric: Vec<bool> = columns
        .iter()
        .map(|c| is_numeric_column(c, records))
        .collect();

    records
        .iter()
        .map(|record| {
            columns
                .iter()
                .zip(&numeric)
                .map(|(column, is_numeric)| match record.get(column) {
                    Some(value) => value.to_string(),
                    None if *is_numeric => "0".to_string(),
                    None => String::new(),
                })
                .collect()
        })
        .collect()
}

/// Render header and rows into a byte buffer.
pub fn render(columns: &[String], records: &[Record], format: ExportFormat) -> Vec<u8> {
    let sep = format.separator();
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_row(&mut out, columns, sep);
    for row in build_rows(columns, records) {
        let _ = write_row(&mut out, &row, sep);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fields, OutputSet, OutputSnapshot};

    fn sample() -> OutputSnapshot {
        let mut set = OutputSet::new();
        let a: Fields = [
            ("Institute Name", FieldValue::from("Anna University, Chennai")),
            ("Total Patents", FieldValue::from(4)),
        ]
        .into_iter()
        .collect();
        let b: Fields = [
            ("Institute Name", FieldValue::from("PSG \"Tech\"")),
            ("District", FieldValue::from("Coimbatore")),
        ]
        .into_iter()
        .collect();
        set.push(Record::new("https://irins.org/a", a));
        set.push(Record::new("https://irins.org/b", b));
        set.snapshot(None)
    }

    #[test]
    fn test_missing_numeric_cells_default_to_zero() {
        let set = sample();
        let rows = build_rows(&set.columns, &set.records);
        assert_eq!(rows[1], vec!["PSG \"Tech\"", "0", "Coimbatore"]);
        assert_eq!(rows[0][2], "");
    }

    #[test]
    fn test_csv_quoting() {
        let set = sample();
        let text = String::from_utf8(render(&set.columns, &set.records, ExportFormat::Csv)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Institute Name,Total Patents,District");
        assert_eq!(lines[1], "\"Anna University, Chennai\",4,");
        assert_eq!(lines[2], "\"PSG \"\"Tech\"\"\",0,Coimbatore");
    }

    #[test]
    fn test_tsv_leaves_commas_unquoted() {
        let set = sample();
        let text = String::from_utf8(render(&set.columns, &set.records, ExportFormat::Tsv)).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("Anna University, Chennai\t4"));
    }
}
