use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::input::table::parse_table;
use crate::input::{ColumnKind, InputError};

pub const MANUAL_SAMPLE_ID_COLUMN: &str = "sample_id";
pub const MANUAL_CONDITION_COLUMN: &str = "condition";
pub const MANUAL_CONDITIONS_FILE: &str = "conditions.csv";

#[derive(Debug, Clone, Copy)]
pub enum ConditionsInput<'a> {
    Manual(&'a [(String, String)]),
    Table(Option<&'a Path>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedConditions {
    pub path: PathBuf,
    pub sample_id_column: String,
}

/// Produces the condition table path handed to the engine.
///
/// Manual pairs are written as a `sample_id,condition` table in input order.
/// A table path is passed through once it is known to exist.
pub fn normalize_conditions(
    input: ConditionsInput<'_>,
    sample_id_column: &str,
    work_dir: &Path,
) -> Result<NormalizedConditions, InputError> {
    match input {
        ConditionsInput::Manual(pairs) => {
            if pairs.is_empty() {
                return Err(InputError::EmptyManualConditions);
            }
            fs::create_dir_all(work_dir)?;
            let path = work_dir.join(MANUAL_CONDITIONS_FILE);
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record([MANUAL_SAMPLE_ID_COLUMN, MANUAL_CONDITION_COLUMN])?;
            for (sample, condition) in pairs {
                writer.write_record([sample, condition])?;
            }
            writer.flush()?;
            Ok(NormalizedConditions {
                path,
                sample_id_column: MANUAL_SAMPLE_ID_COLUMN.to_string(),
            })
        }
        ConditionsInput::Table(None) => Err(InputError::MissingConditionsTable),
        ConditionsInput::Table(Some(path)) => {
            if !path.is_file() {
                return Err(InputError::MissingInput(format!(
                    "design matrix {} does not exist",
                    path.display()
                )));
            }
            Ok(NormalizedConditions {
                path: path.to_path_buf(),
                sample_id_column: sample_id_column.to_string(),
            })
        }
    }
}

/// Sample id -> condition column -> value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConditionTable {
    pub sample_id_column: String,
    /// Condition columns in header order, sample-id column excluded.
    pub columns: Vec<String>,
    pub rows: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConditionTable {
    pub fn load(path: &Path, sample_id_column: &str) -> Result<Self, InputError> {
        let table = parse_table(path)?;
        let sample_col = table.column(sample_id_column, ColumnKind::SampleId)?;
        let columns: Vec<(usize, String)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != sample_col.0)
            .map(|(idx, name)| (idx, name.clone()))
            .collect();

        tracing::info!("design matrix:");
        let mut rows = BTreeMap::new();
        for row in table {
            let row = row?;
            let sample = sample_col.get(&row);
            if sample.is_empty() {
                continue;
            }
            let values: BTreeMap<String, String> = columns
                .iter()
                .map(|(idx, name)| {
                    let value = row.get(*idx).cloned().unwrap_or_default();
                    (name.clone(), value)
                })
                .collect();
            let echo: Vec<&str> = columns
                .iter()
                .map(|(_, name)| values.get(name).map(String::as_str).unwrap_or(""))
                .collect();
            tracing::info!("{sample}: {}", echo.join(", "));

            if rows.insert(sample.to_string(), values).is_some() {
                return Err(InputError::DuplicateSample(sample.to_string()));
            }
        }

        Ok(Self {
            sample_id_column: sample_id_column.to_string(),
            columns: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        })
    }

    /// Builds the table straight from manually entered pairs, without reading
    /// back the file written by `normalize_conditions`.
    pub fn from_manual(pairs: &[(String, String)]) -> Result<Self, InputError> {
        tracing::info!("design matrix:");
        let mut rows = BTreeMap::new();
        for (sample, condition) in pairs {
            tracing::info!("{sample}: {condition}");
            let values = BTreeMap::from([(MANUAL_CONDITION_COLUMN.to_string(), condition.clone())]);
            if rows.insert(sample.clone(), values).is_some() {
                return Err(InputError::DuplicateSample(sample.clone()));
            }
        }
        Ok(Self {
            sample_id_column: MANUAL_SAMPLE_ID_COLUMN.to_string(),
            columns: vec![MANUAL_CONDITION_COLUMN.to_string()],
            rows,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/conditions.rs"]
mod tests;
