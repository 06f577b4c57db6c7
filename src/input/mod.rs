use std::path::PathBuf;

use thiserror::Error;

use crate::notify::Notice;

pub mod conditions;
pub mod counts;
pub mod delimited;
pub mod table;
pub mod xlsx;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid spreadsheet {}: {reason}", .path.display())]
    Spreadsheet { path: PathBuf, reason: String },
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("table {} has no header row", .0.display())]
    EmptyTable(PathBuf),
    #[error(
        "{kind} column '{column}' could not be found; available columns: {}",
        .available.join(", ")
    )]
    ColumnNotFound {
        kind: ColumnKind,
        column: String,
        available: Vec<String>,
    },
    #[error(
        "count tables being combined are not sorted in the same order: {found} != {expected} on line {line} of {}",
        .table.display()
    )]
    GeneOrderMismatch {
        table: PathBuf,
        line: usize,
        expected: String,
        found: String,
    },
    #[error(
        "count table {} ended on line {line} before the first table",
        .table.display()
    )]
    TableTooShort { table: PathBuf, line: usize },
    #[error(
        "count table {} has rows past line {line} where the first table ends",
        .table.display()
    )]
    TableTooLong { table: PathBuf, line: usize },
    #[error("design matrix file input requested but no location specified")]
    MissingConditionsTable,
    #[error("design matrix is empty")]
    EmptyManualConditions,
    #[error("duplicate sample id '{0}' in design matrix")]
    DuplicateSample(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    GeneId,
    SampleId,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::GeneId => write!(f, "gene ID"),
            ColumnKind::SampleId => write!(f, "sample ID"),
        }
    }
}

impl InputError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            InputError::ColumnNotFound {
                kind,
                column,
                available,
            } => {
                let (title, label) = match kind {
                    ColumnKind::GeneId => ("Invalid gene ID column selected", "Gene ID"),
                    ColumnKind::SampleId => ("Invalid sample ID column selected", "Sample ID"),
                };
                Some(Notice::error(
                    title,
                    format!(
                        "{label} column '{column}' could not be found\nAvailable Columns:\n{}",
                        available
                            .iter()
                            .map(|c| format!("- {c}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    ),
                ))
            }
            InputError::GeneOrderMismatch { .. }
            | InputError::TableTooShort { .. }
            | InputError::TableTooLong { .. } => Some(Notice::error(
                "Count tables could not be combined",
                self.to_string(),
            )),
            InputError::MissingConditionsTable => Some(Notice::error(
                "Invariant violation",
                "Expected a design matrix path but it is null",
            )),
            InputError::EmptyManualConditions => Some(Notice::error(
                "Design matrix is empty",
                "No data provided in the form",
            )),
            InputError::DuplicateSample(sample) => Some(Notice::error(
                "Invalid design matrix",
                format!("Sample '{sample}' appears more than once"),
            )),
            InputError::MissingInput(msg) => Some(Notice::error("Missing input", msg.clone())),
            _ => None,
        }
    }
}
