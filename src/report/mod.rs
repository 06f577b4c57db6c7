//! The `.deseqreport` container: a little-endian `u32` manifest length, the
//! UTF-8 JSON manifest, then every embedded artifact's raw bytes back to back
//! in `embedded_data_order`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::contrast::LevelOptions;
use crate::notify::Notice;

pub mod container;
pub mod pack;
pub mod unpack;

pub const REPORT_FILE_NAME: &str = "Report.deseqreport";
pub const UNPACK_SUFFIX: &str = ".out";

pub const DDS_KEY: &str = "_dds";
pub const SAMPLE_CORR_KEY: &str = "sample_corr";
pub const COUNTS_HEATMAP_KEY: &str = "counts_heatmap";
pub const SIZE_FACTOR_QC_KEY: &str = "size_factor_qc";
pub const PCA_KEY_PREFIX: &str = "pca/";

/// Fixed artifact keys and the file names they unpack to.
pub const RENAMED_KEYS: [(&str, &str); 4] = [
    (DDS_KEY, "dds.rds"),
    (SAMPLE_CORR_KEY, "Sample Correlation.html"),
    (COUNTS_HEATMAP_KEY, "Counts Heatmap.html"),
    (SIZE_FACTOR_QC_KEY, "Size Factor QC.html"),
];

pub fn renamed_key(key: &str) -> Option<&'static str> {
    RENAMED_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub report_name: String,
    pub genes: Vec<String>,
    pub level_options: LevelOptions,
    pub embedded_data_sizes: BTreeMap<String, u64>,
    pub embedded_data_order: Vec<String>,
}

impl Manifest {
    pub fn total_data_size(&self) -> u64 {
        self.embedded_data_order
            .iter()
            .filter_map(|key| self.embedded_data_sizes.get(key))
            .sum()
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("contrast directory {} is missing", .0.display())]
    MissingContrastDir(PathBuf),
    #[error("artifact '{key}' is missing at {}", .path.display())]
    MissingArtifact { key: String, path: PathBuf },
    #[error("refusing to overwrite existing output {}", .0.display())]
    OutputExists(PathBuf),
    #[error("corrupt report container: {0}")]
    Corrupt(String),
    #[error("artifact '{key}' changed while packing: declared {declared} bytes, copied {copied}")]
    SizeChanged {
        key: String,
        declared: u64,
        copied: u64,
    },
    #[error("manifest of {0} bytes does not fit the length prefix")]
    ManifestTooLarge(usize),
}

impl ReportError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ReportError::MissingContrastDir(_) | ReportError::MissingArtifact { .. } => Some(
                Notice::error("Missing DESeq2 outputs", self.to_string()),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
