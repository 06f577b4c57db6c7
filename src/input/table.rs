use std::path::{Path, PathBuf};

use crate::input::delimited::{delimited_reader, record_to_row, strip_bom};
use crate::input::xlsx::{FirstSheet, read_first_sheet};
use crate::input::{ColumnKind, InputError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Spreadsheet,
    Delimited(u8),
}

type RowIter = Box<dyn Iterator<Item = Result<Vec<String>, InputError>>>;

/// Header plus a lazy stream of fixed-schema rows.
pub struct Table {
    pub path: PathBuf,
    pub format: TableFormat,
    pub headers: Vec<String>,
    rows: RowIter,
}

/// A column resolved once against a table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndex(pub usize);

impl ColumnIndex {
    /// Short rows read as empty cells.
    pub fn get<'r>(&self, row: &'r [String]) -> &'r str {
        row.get(self.0).map(String::as_str).unwrap_or("")
    }
}

impl Table {
    pub fn column(&self, name: &str, kind: ColumnKind) -> Result<ColumnIndex, InputError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(ColumnIndex)
            .ok_or_else(|| InputError::ColumnNotFound {
                kind,
                column: name.to_string(),
                available: self.headers.clone(),
            })
    }

    pub fn first_header(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }
}

impl Iterator for Table {
    type Item = Result<Vec<String>, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Reads `path` as a spreadsheet when it is one, as delimited text otherwise.
pub fn parse_table(path: &Path) -> Result<Table, InputError> {
    if !path.is_file() {
        return Err(InputError::MissingInput(format!(
            "table {} does not exist",
            path.display()
        )));
    }

    match read_first_sheet(path)? {
        FirstSheet::Sheet(rows) => {
            let mut rows = rows.into_iter();
            let headers = rows
                .next()
                .ok_or_else(|| InputError::EmptyTable(path.to_path_buf()))?;
            debug_opened(path, "spreadsheet", &headers);
            Ok(Table {
                path: path.to_path_buf(),
                format: TableFormat::Spreadsheet,
                headers,
                rows: Box::new(rows.map(Ok)),
            })
        }
        FirstSheet::NotSpreadsheet => {
            let (delimiter, reader) = delimited_reader(path, true)?;
            let mut records = reader.into_records();
            let mut headers = match records.next() {
                Some(record) => record_to_row(record?),
                None => return Err(InputError::EmptyTable(path.to_path_buf())),
            };
            strip_bom(&mut headers);
            debug_opened(path, "delimited", &headers);
            Ok(Table {
                path: path.to_path_buf(),
                format: TableFormat::Delimited(delimiter),
                headers,
                rows: Box::new(
                    records.map(|record| record.map(record_to_row).map_err(InputError::from)),
                ),
            })
        }
    }
}

fn debug_opened(path: &Path, kind: &str, headers: &[String]) {
    tracing::debug!(
        "opened {kind} table {} with {} columns",
        path.display(),
        headers.len()
    );
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/table.rs"]
mod tests;
