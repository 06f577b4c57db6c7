use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::model::contrast::{ContrastIdentifier, LevelOptions};
use crate::notify::{Notice, Notifier};
use crate::report::container::{Artifact, write_container};
use crate::report::unpack::artifact_path;
use crate::report::{
    COUNTS_HEATMAP_KEY, DDS_KEY, Manifest, PCA_KEY_PREFIX, REPORT_FILE_NAME, ReportError,
    SAMPLE_CORR_KEY, SIZE_FACTOR_QC_KEY,
};

pub const CONTRAST_DATA_DIR: &str = "Data/Contrast";
pub const PCA_PLOTS_DIR: &str = "Plots/QC/PCA";

/// One parsed contrast table and where the engine puts its plots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContrastEntry {
    pub id: String,
    pub table: PathBuf,
    pub qc_plot: PathBuf,
    pub ma_plot: PathBuf,
    pub volcano_plot: PathBuf,
}

impl ContrastEntry {
    fn new(output_dir: &Path, table: PathBuf, contrast: &ContrastIdentifier) -> Self {
        let stem = table.file_stem().unwrap_or_default();
        let stem = stem.to_string_lossy().into_owned();
        let contrast_plots = output_dir.join("Plots/Contrast").join(&stem);
        Self {
            id: contrast.id(),
            qc_plot: output_dir
                .join("Plots/QC/Variance P-Value")
                .join(format!("{stem}.png")),
            ma_plot: contrast_plots.join("MA.html"),
            volcano_plot: contrast_plots.join("Volcano.html"),
            table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub manifest: Manifest,
    pub contrasts: Vec<ContrastEntry>,
}

/// Builds the contrast taxonomy from `Data/Contrast`. Files whose names do not
/// follow `"{level1} vs {level2} ({column})"` are reported and skipped.
pub fn derive_level_options(
    output_dir: &Path,
    notifier: &dyn Notifier,
) -> Result<(LevelOptions, Vec<ContrastEntry>), ReportError> {
    let contrast_dir = output_dir.join(CONTRAST_DATA_DIR);
    if !contrast_dir.is_dir() {
        return Err(ReportError::MissingContrastDir(contrast_dir));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(&contrast_dir)? {
        paths.push(entry?.path());
    }
    paths.sort();

    let mut options = LevelOptions::new();
    let mut contrasts = Vec::new();
    for path in paths {
        match ContrastIdentifier::from_file_name(&path) {
            Some(contrast) => {
                tracing::debug!("contrast {} from {}", contrast.id(), path.display());
                contrasts.push(ContrastEntry::new(output_dir, path.clone(), &contrast));
                contrast.insert_into(&mut options);
            }
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let notice = Notice::warning(
                    format!("Failed to parse contrast data for {name}"),
                    "Skipping plot generation for this contrast",
                );
                tracing::warn!("{}: {}", notice.title, notice.body);
                notifier.send(&notice);
            }
        }
    }
    Ok((options, contrasts))
}

fn required_artifact(key: &str, candidates: &[PathBuf]) -> Result<Artifact, ReportError> {
    for path in candidates {
        if let Ok(meta) = fs::metadata(path)
            && meta.is_file()
        {
            return Ok(Artifact {
                key: key.to_string(),
                path: path.clone(),
                size: meta.len(),
            });
        }
    }
    Err(ReportError::MissingArtifact {
        key: key.to_string(),
        path: candidates.first().cloned().unwrap_or_default(),
    })
}

/// The fixed artifacts plus one `pca/<stem>` entry per PCA plot, sorted by key.
/// A PCA plot that would unpack onto an earlier one is skipped.
pub fn collect_artifacts(output_dir: &Path) -> Result<Vec<Artifact>, ReportError> {
    let data = output_dir.join("Data");
    let plots = output_dir.join("Plots");
    let qc = plots.join("QC");

    let mut artifacts = vec![
        required_artifact(DDS_KEY, &[data.join("dds.rds")])?,
        required_artifact(
            SAMPLE_CORR_KEY,
            &[
                qc.join("Sample Correlation.html"),
                plots.join("Sample Correlation.html"),
            ],
        )?,
        required_artifact(COUNTS_HEATMAP_KEY, &[qc.join("Counts Heatmap.html")])?,
        required_artifact(SIZE_FACTOR_QC_KEY, &[qc.join("Size Factor QC.html")])?,
    ];

    let pca_dir = output_dir.join(PCA_PLOTS_DIR);
    if pca_dir.is_dir() {
        let mut pca_paths = Vec::new();
        for entry in fs::read_dir(&pca_dir)? {
            pca_paths.push(entry?.path());
        }
        pca_paths.sort();

        let mut unpacked = BTreeSet::new();
        for path in pca_paths {
            if !path.extension().is_some_and(|ext| ext == "html") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = format!("{PCA_KEY_PREFIX}{stem}");
            match artifact_path(&key) {
                Ok(target) if unpacked.insert(target.clone()) => {}
                _ => {
                    tracing::warn!("PCA plot {} skipped: name taken or unsafe", path.display());
                    continue;
                }
            }
            let size = fs::metadata(&path)?.len();
            artifacts.push(Artifact { key, size, path });
        }
    } else {
        tracing::warn!("no PCA plots found under {}", pca_dir.display());
    }

    artifacts.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(artifacts)
}

pub fn build_manifest(
    report_name: &str,
    genes: &BTreeSet<String>,
    level_options: LevelOptions,
    artifacts: &[Artifact],
) -> Manifest {
    Manifest {
        report_name: report_name.to_string(),
        genes: genes.iter().cloned().collect(),
        level_options,
        embedded_data_sizes: artifacts.iter().map(|a| (a.key.clone(), a.size)).collect(),
        embedded_data_order: artifacts.iter().map(|a| a.key.clone()).collect(),
    }
}

/// Packs the engine output tree under `output_dir` into
/// `output_dir/Report.deseqreport`.
pub fn pack_report(
    output_dir: &Path,
    report_name: &str,
    genes: &BTreeSet<String>,
    notifier: &dyn Notifier,
) -> Result<PackSummary, ReportError> {
    let (level_options, contrasts) = derive_level_options(output_dir, notifier)?;
    let artifacts = collect_artifacts(output_dir)?;
    let manifest = build_manifest(report_name, genes, level_options, &artifacts);

    let path = output_dir.join(REPORT_FILE_NAME);
    let bytes_written = {
        let mut out = BufWriter::new(File::create(&path)?);
        write_container(&mut out, &manifest, &artifacts)
    };
    let bytes_written = match bytes_written {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
    };

    tracing::info!(
        "packed {} artifacts, {} genes, {} contrast columns into {} ({} bytes)",
        artifacts.len(),
        manifest.genes.len(),
        manifest.level_options.len(),
        path.display(),
        bytes_written
    );
    Ok(PackSummary {
        path,
        bytes_written,
        manifest,
        contrasts,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/pack.rs"]
pub(crate) mod tests;
