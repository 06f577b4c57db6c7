use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, RunEnv, RunParams};
use crate::input::InputError;
use crate::model::DesignError;
use crate::notify::{Notice, Notifier};
use crate::report::ReportError;
use crate::report::pack::PackSummary;

pub mod stage1_inputs;
pub mod stage2_engine;
pub mod stage3_report;

pub use stage2_engine::EngineError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl RunError {
    /// The user-facing notice for this failure, if it has one.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            RunError::Config(e) => e.notice(),
            RunError::Input(e) => e.notice(),
            RunError::Design(e) => e.notice(),
            RunError::Engine(e) => e.notice(),
            RunError::Report(e) => e.notice(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub report: PackSummary,
}

/// Runs inputs, engine and report packing in order. A failure with a notice is
/// reported through `notifier` before it is returned; a finished run sends an
/// info notice naming the report.
pub fn run_pipeline(
    params: &RunParams,
    env: &RunEnv,
    notifier: &dyn Notifier,
    log: &mut dyn Write,
) -> Result<RunSummary, RunError> {
    let result = run_stages(params, env, notifier, log);
    match &result {
        Ok(summary) => notifier.send(&Notice::info(
            "DESeq2 report ready",
            format!("Report written to {}", summary.report.path.display()),
        )),
        Err(err) => {
            if let Some(notice) = err.notice() {
                notifier.send(&notice);
            }
        }
    }
    result
}

fn run_stages(
    params: &RunParams,
    env: &RunEnv,
    notifier: &dyn Notifier,
    log: &mut dyn Write,
) -> Result<RunSummary, RunError> {
    let inputs = stage1_inputs::run_stage1(params, env)?;
    tracing::info!(
        "{} samples, {} genes; running the statistics engine",
        inputs.condition_table.n_samples(),
        inputs.genes.len()
    );

    let invocation = stage2_engine::EngineInvocation {
        conditions_path: &inputs.conditions.path,
        sample_id_column: &inputs.conditions.sample_id_column,
        design: &inputs.design,
        counts_path: &inputs.counts.path,
        gene_id_column: &inputs.counts.gene_id_column,
        highlighted_genes: &params.highlighted_genes,
        top_genes: params.number_of_genes_to_plot,
        output_dir: &inputs.output_dir,
    };
    stage2_engine::run_engine(&env.engine, &invocation, notifier, log)?;

    let report = stage3_report::write_report(
        &inputs.output_dir,
        &params.report_name,
        &inputs.genes,
        notifier,
    )?;
    Ok(RunSummary {
        output_dir: inputs.output_dir,
        report,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
