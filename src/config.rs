use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::Notice;

pub const DEFAULT_SAMPLE_ID_COLUMN: &str = "sample_id";
pub const DEFAULT_TOP_GENES: u32 = 30;
pub const DEFAULT_RESULTS_DIR: &str = "DESeq2 Results";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid parameter file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("report name is empty")]
    MissingReportName,
    #[error("custom output location requested but not specified")]
    MissingOutputLocation,
    #[error("single count table source selected but no count table given")]
    MissingCountTable,
}

impl ConfigError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ConfigError::MissingOutputLocation => Some(Notice::error(
                "Invariant violation",
                "Expected a custom output location but it is null",
            )),
            ConfigError::MissingCountTable => Some(Notice::error(
                "Invariant violation",
                "Expected the single count table source to be set",
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountTableSource {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConditionsSource {
    #[default]
    Manual,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputLocationType {
    #[default]
    Default,
    Custom,
}

impl OutputLocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputLocationType::Default => "default",
            OutputLocationType::Custom => "custom",
        }
    }
}

/// Full parameter set of one analysis run, loadable from a JSON parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub report_name: String,
    pub count_table_source: CountTableSource,
    pub raw_count_table: Option<PathBuf>,
    pub raw_count_tables: Vec<PathBuf>,
    pub count_table_gene_id_column: Option<String>,
    pub output_location_type: OutputLocationType,
    pub output_location: Option<PathBuf>,
    pub conditions_source: ConditionsSource,
    pub manual_conditions: Vec<(String, String)>,
    pub conditions_table: Option<PathBuf>,
    pub design_matrix_sample_id_column: Option<String>,
    pub design_formula: Vec<(String, String)>,
    pub number_of_genes_to_plot: u32,
    /// Genes the engine should always label in its plots.
    pub highlighted_genes: Vec<String>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            report_name: String::new(),
            count_table_source: CountTableSource::Single,
            raw_count_table: None,
            raw_count_tables: Vec::new(),
            count_table_gene_id_column: None,
            output_location_type: OutputLocationType::Default,
            output_location: None,
            conditions_source: ConditionsSource::Manual,
            manual_conditions: Vec::new(),
            conditions_table: None,
            design_matrix_sample_id_column: None,
            design_formula: vec![("condition".to_string(), "explanatory".to_string())],
            number_of_genes_to_plot: DEFAULT_TOP_GENES,
            highlighted_genes: Vec::new(),
        }
    }
}

impl RunParams {
    pub fn sample_id_column(&self) -> &str {
        self.design_matrix_sample_id_column
            .as_deref()
            .unwrap_or(DEFAULT_SAMPLE_ID_COLUMN)
    }

    /// Label of the count input used in the parameter echo.
    pub fn count_table_label(&self) -> String {
        match self.count_table_source {
            CountTableSource::Single => self
                .raw_count_table
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            CountTableSource::Multiple => "combined".to_string(),
        }
    }
}

pub fn load_params(path: &Path) -> Result<RunParams, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// How the statistics engine is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub program: String,
    pub script: Option<PathBuf>,
    pub working_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "Rscript".to_string(),
            script: Some(PathBuf::from("deseq2.r")),
            working_dir: PathBuf::from("./r_scripts"),
        }
    }
}

/// Where a run keeps its intermediate tables and resolves default output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEnv {
    pub engine: EngineConfig,
    pub work_dir: PathBuf,
    pub output_root: PathBuf,
}

impl Default for RunEnv {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            work_dir: PathBuf::from("."),
            output_root: PathBuf::from("."),
        }
    }
}

pub fn sanitize_report_name(name: &str) -> String {
    name.replace('/', "_")
}

pub fn resolve_output_dir(params: &RunParams, output_root: &Path) -> Result<PathBuf, ConfigError> {
    match params.output_location_type {
        OutputLocationType::Default => Ok(output_root
            .join(DEFAULT_RESULTS_DIR)
            .join(sanitize_report_name(&params.report_name))),
        OutputLocationType::Custom => params
            .output_location
            .clone()
            .ok_or(ConfigError::MissingOutputLocation),
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
