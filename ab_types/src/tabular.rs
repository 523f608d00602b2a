//! Tab-delimited tool output, normalized defensively.
//!
//! Typing tools emit tab-delimited tables with a positional header row.
//! Malformed rows are normalized, never rejected: short rows are
//! right-padded with empty fields, long rows truncated to the header width.

use anyhow::{Context, Result};
use std::path::Path;

/// A parsed tab-delimited report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularReport {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularReport {
    /// Read and parse a report file. A missing file is an error; use
    /// [`TabularReport::read_or_empty`] where absence is tolerated.
    pub fn read(path: &Path) -> Result<TabularReport> {
        let text = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
        Ok(TabularReport::parse(&text))
    }

    /// Read a report that may legitimately be absent (e.g. one of the two
    /// per-kind outputs when a database had no hits).
    pub fn read_or_empty(path: &Path) -> Result<TabularReport> {
        if path.exists() {
            TabularReport::read(path)
        } else {
            Ok(TabularReport::default())
        }
    }

    /// Parse tab-delimited text. The first line is the header; every data
    /// row is normalized to the header width.
    pub fn parse(text: &str) -> TabularReport {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = match rdr.headers() {
            Ok(headers) => headers.iter().map(str::to_string).collect(),
            Err(_) => return TabularReport::default(),
        };
        if headers.iter().all(String::is_empty) {
            return TabularReport::default();
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in rdr.records().flatten() {
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.iter().all(String::is_empty) {
                continue;
            }
            row.resize(width, String::new());
            rows.push(row);
        }
        TabularReport { headers, rows }
    }

    /// Union of two related reports for one logical sample: header from the
    /// first, data rows from both, second header discarded.
    pub fn merge(first: TabularReport, second: TabularReport) -> TabularReport {
        if first.headers.is_empty() {
            return second;
        }
        let width = first.headers.len();
        let mut rows = first.rows;
        for mut row in second.rows {
            row.resize(width, String::new());
            rows.push(row);
        }
        TabularReport {
            headers: first.headers,
            rows,
        }
    }

    /// Value of the named column in `row`, or empty when the column is
    /// absent from this report's header.
    pub fn value<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| row.get(i))
            .map_or("", String::as_str)
    }

    /// Serialize back to tab-delimited text. Tabs and newlines inside
    /// fields are replaced by spaces so the format cannot break.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)
            .with_context(|| path.display().to_string())?;
        wtr.write_record(self.headers.iter().map(|h| sanitize_field(h)))?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|f| sanitize_field(f)))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Replace field-internal tabs and newlines with spaces.
pub fn sanitize_field(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_rows_are_padded_and_long_rows_truncated() {
        let report = TabularReport::parse("A\tB\tC\n1\t2\n1\t2\t3\t4\n");
        assert_eq!(report.headers, ["A", "B", "C"]);
        assert_eq!(report.rows, [["1", "2", ""], ["1", "2", "3"]]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let report = TabularReport::parse("A\tB\nx\ty\n\n");
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn empty_text_yields_empty_report() {
        assert_eq!(TabularReport::parse(""), TabularReport::default());
    }

    #[test]
    fn merge_is_a_union_of_rows() {
        // Two per-kind outputs with the same header and one data row each
        // must merge into one header and exactly two data rows.
        let k = TabularReport::parse("H\tST\nk1\t1\n");
        let o = TabularReport::parse("H\tST\no1\t2\n");
        let merged = TabularReport::merge(k, o);
        assert_eq!(merged.headers, ["H", "ST"]);
        assert_eq!(merged.rows, [["k1", "1"], ["o1", "2"]]);
    }

    #[test]
    fn merge_with_empty_first_keeps_second() {
        let second = TabularReport::parse("A\n1\n");
        let merged = TabularReport::merge(TabularReport::default(), second.clone());
        assert_eq!(merged, second);
    }

    #[test]
    fn value_tolerates_missing_columns() {
        let report = TabularReport::parse("A\tB\n1\t2\n");
        let row = &report.rows[0];
        assert_eq!(report.value(row, "B"), "2");
        assert_eq!(report.value(row, "Z"), "");
    }
}
