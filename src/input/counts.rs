use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::input::delimited::{delimited_reader, record_to_row, strip_bom};
use crate::input::table::parse_table;
use crate::input::{ColumnKind, InputError};

pub const COMBINED_COUNTS_FILE: &str = "combined_counts.csv";

#[derive(Debug, Clone, Copy)]
pub enum CountsInput<'a> {
    Single(&'a Path),
    Merge(&'a [PathBuf]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCounts {
    pub path: PathBuf,
    pub gene_id_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub gene_id_column: String,
    pub n_genes: usize,
    pub n_samples: usize,
}

/// Reconciles the count input into one table path plus its gene-id column.
pub fn normalize_counts(
    input: CountsInput<'_>,
    gene_id_column: Option<&str>,
    work_dir: &Path,
) -> Result<NormalizedCounts, InputError> {
    match input {
        CountsInput::Single(path) => {
            if !path.is_file() {
                return Err(InputError::MissingInput(format!(
                    "count table {} does not exist",
                    path.display()
                )));
            }
            let gene_id_column = match gene_id_column {
                Some(column) => column.to_string(),
                None => {
                    let table = parse_table(path)?;
                    table
                        .first_header()
                        .map(str::to_string)
                        .ok_or_else(|| InputError::EmptyTable(path.to_path_buf()))?
                }
            };
            Ok(NormalizedCounts {
                path: path.to_path_buf(),
                gene_id_column,
            })
        }
        CountsInput::Merge(paths) => {
            fs::create_dir_all(work_dir)?;
            let out_path = work_dir.join(COMBINED_COUNTS_FILE);
            let summary = merge_count_tables(paths, &out_path)?;
            tracing::info!(
                "combined {} count tables: {} genes x {} samples",
                paths.len(),
                summary.n_genes,
                summary.n_samples
            );
            Ok(NormalizedCounts {
                path: out_path,
                gene_id_column: summary.gene_id_column,
            })
        }
    }
}

/// Joins count tables column-wise. Every table must list the same gene ids in
/// the same order; the first column of every table after the first is dropped.
/// A partially written output is removed on failure.
pub fn merge_count_tables(paths: &[PathBuf], out_path: &Path) -> Result<MergeSummary, InputError> {
    let result = merge_into(paths, out_path);
    if result.is_err() {
        let _ = fs::remove_file(out_path);
    }
    result
}

fn merge_into(paths: &[PathBuf], out_path: &Path) -> Result<MergeSummary, InputError> {
    let Some((first_path, rest_paths)) = paths.split_first() else {
        return Err(InputError::MissingInput(
            "no count tables given to combine".to_string(),
        ));
    };

    let first = delimited_reader(first_path, false)?.1.into_records();
    let mut rest = Vec::with_capacity(rest_paths.len());
    for path in rest_paths {
        rest.push(delimited_reader(path, false)?.1.into_records());
    }

    let mut writer = csv::Writer::from_path(out_path)?;
    let mut gene_id_column = None;
    let mut n_samples = 0usize;
    let mut n_lines = 0usize;

    for (line, record) in first.enumerate() {
        let mut row = record_to_row(record?);
        if line == 0 {
            strip_bom(&mut row);
            gene_id_column = row.first().cloned();
        }

        for (reader, path) in rest.iter_mut().zip(rest_paths) {
            let mut other = match reader.next() {
                Some(record) => record_to_row(record?),
                None => {
                    return Err(InputError::TableTooShort {
                        table: path.clone(),
                        line,
                    });
                }
            };
            if line == 0 {
                strip_bom(&mut other);
            }

            let expected = row.first().map(String::as_str).unwrap_or("");
            let found = other.first().map(String::as_str).unwrap_or("");
            if found != expected {
                return Err(InputError::GeneOrderMismatch {
                    table: path.clone(),
                    line,
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
            row.extend(other.into_iter().skip(1));
        }

        if line == 0 {
            n_samples = row.len().saturating_sub(1);
        }
        writer.write_record(&row)?;
        n_lines += 1;
    }

    for (reader, path) in rest.iter_mut().zip(rest_paths) {
        if reader.next().is_some() {
            return Err(InputError::TableTooLong {
                table: path.clone(),
                line: n_lines,
            });
        }
    }
    writer.flush()?;

    let gene_id_column =
        gene_id_column.ok_or_else(|| InputError::EmptyTable(first_path.clone()))?;
    Ok(MergeSummary {
        gene_id_column,
        n_genes: n_lines.saturating_sub(1),
        n_samples,
    })
}

/// Unique gene ids of a normalized count table, in sorted order.
pub fn collect_gene_ids(path: &Path, gene_id_column: &str) -> Result<BTreeSet<String>, InputError> {
    let table = parse_table(path)?;
    let column = table.column(gene_id_column, ColumnKind::GeneId)?;
    let mut genes = BTreeSet::new();
    for row in table {
        let row = row?;
        let gene = column.get(&row);
        if !gene.is_empty() {
            genes.insert(gene.to_string());
        }
    }
    Ok(genes)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/counts.rs"]
mod tests;
