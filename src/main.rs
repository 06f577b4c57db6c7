mod config;
mod input;
mod logging;
mod model;
mod notify;
mod pipeline;
mod report;

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    ConditionsSource, ConfigError, CountTableSource, EngineConfig, OutputLocationType, RunEnv,
    RunParams, load_params,
};
use crate::input::counts::{CountsInput, collect_gene_ids, normalize_counts};
use crate::notify::LogNotifier;
use crate::pipeline::{RunError, run_pipeline};
use crate::report::pack::pack_report;
use crate::report::unpack::{default_unpack_dir, unpack_report};

#[derive(Debug, Parser)]
#[command(name = "kira-deseq2")]
#[command(version)]
#[command(about = "Run DESeq2 on count tables and bundle the results into one report file")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize inputs, run the DESeq2 script and pack its outputs
    Run(RunArgs),
    /// Pack an existing DESeq2 output directory into Report.deseqreport
    Pack(PackArgs),
    /// Restore the files embedded in a report container
    Unpack(UnpackArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// JSON parameter file; flags below override its fields
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    #[arg(long)]
    report_name: Option<String>,

    /// Raw count table; repeat to combine several tables column-wise
    #[arg(long = "counts", value_name = "FILE")]
    counts: Vec<PathBuf>,

    /// Defaults to `multiple` when --counts is repeated
    #[arg(long, value_enum)]
    count_source: Option<CountTableSource>,

    #[arg(long)]
    gene_id_column: Option<String>,

    /// Design matrix file (CSV, TSV or XLSX)
    #[arg(long, value_name = "FILE", conflicts_with = "conditions")]
    conditions_table: Option<PathBuf>,

    /// Manual design matrix entry; repeat once per sample
    #[arg(long = "condition", value_name = "SAMPLE=CONDITION", value_parser = parse_condition)]
    conditions: Vec<(String, String)>,

    #[arg(long)]
    sample_id_column: Option<String>,

    /// Design formula term; role is explanatory, confounding or cluster
    #[arg(long = "term", value_name = "COLUMN:ROLE", value_parser = parse_term)]
    terms: Vec<(String, String)>,

    /// Number of top genes to plot
    #[arg(long)]
    top_genes: Option<u32>,

    /// Gene to label in plots; repeatable
    #[arg(long = "highlight", value_name = "GENE")]
    highlighted_genes: Vec<String>,

    /// Custom output directory instead of `DESeq2 Results/<report name>`
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = ".")]
    output_root: PathBuf,

    /// Where combined count tables and manual design matrices are written
    #[arg(long, value_name = "DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Statistics engine program
    #[arg(long)]
    engine: Option<String>,

    #[arg(long, value_name = "FILE")]
    engine_script: Option<PathBuf>,

    /// Working directory of the engine process
    #[arg(long, value_name = "DIR")]
    engine_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PackArgs {
    /// DESeq2 output directory (contains Data/ and Plots/)
    #[arg(long, value_name = "DIR")]
    input: PathBuf,

    #[arg(long)]
    report_name: String,

    /// Count table providing the gene list
    #[arg(long, value_name = "FILE")]
    counts: Option<PathBuf>,

    #[arg(long, requires = "counts")]
    gene_id_column: Option<String>,
}

#[derive(Debug, Args)]
struct UnpackArgs {
    /// Report container to unpack
    report: PathBuf,

    /// Output directory; defaults to `<report>.out`
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

fn parse_condition(value: &str) -> Result<(String, String), String> {
    let (sample, condition) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SAMPLE=CONDITION, got '{value}'"))?;
    if sample.is_empty() {
        return Err(format!("empty sample id in '{value}'"));
    }
    Ok((sample.to_string(), condition.to_string()))
}

fn parse_term(value: &str) -> Result<(String, String), String> {
    let (column, role) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected COLUMN:ROLE, got '{value}'"))?;
    Ok((column.to_string(), role.to_string()))
}

impl RunArgs {
    fn into_params(self) -> Result<(RunParams, RunEnv), ConfigError> {
        let mut params = match &self.params {
            Some(path) => load_params(path)?,
            None => RunParams::default(),
        };

        if let Some(name) = self.report_name {
            params.report_name = name;
        }
        if !self.counts.is_empty() {
            params.count_table_source = if self.counts.len() > 1 {
                CountTableSource::Multiple
            } else {
                CountTableSource::Single
            };
            params.raw_count_table = self.counts.first().cloned();
            params.raw_count_tables = self.counts;
        }
        if let Some(source) = self.count_source {
            params.count_table_source = source;
        }
        if self.gene_id_column.is_some() {
            params.count_table_gene_id_column = self.gene_id_column;
        }
        if let Some(path) = self.conditions_table {
            params.conditions_source = ConditionsSource::Table;
            params.conditions_table = Some(path);
        }
        if !self.conditions.is_empty() {
            params.conditions_source = ConditionsSource::Manual;
            params.manual_conditions = self.conditions;
        }
        if self.sample_id_column.is_some() {
            params.design_matrix_sample_id_column = self.sample_id_column;
        }
        if !self.terms.is_empty() {
            params.design_formula = self.terms;
        }
        if let Some(top) = self.top_genes {
            params.number_of_genes_to_plot = top;
        }
        if !self.highlighted_genes.is_empty() {
            params.highlighted_genes = self.highlighted_genes;
        }
        if let Some(output) = self.output {
            params.output_location_type = OutputLocationType::Custom;
            params.output_location = Some(output);
        }

        let mut engine = EngineConfig::default();
        if let Some(program) = self.engine {
            engine.program = program;
        }
        if self.engine_script.is_some() {
            engine.script = self.engine_script;
        }
        if let Some(dir) = self.engine_dir {
            engine.working_dir = dir;
        }

        let env = RunEnv {
            engine,
            work_dir: self.work_dir,
            output_root: self.output_root,
        };
        Ok((params, env))
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), RunError> {
    match command {
        Command::Run(args) => {
            let (params, env) = args.into_params()?;
            let summary = run_pipeline(&params, &env, &LogNotifier, &mut io::stdout())?;
            tracing::info!(
                "report written to {} ({} bytes)",
                summary.report.path.display(),
                summary.report.bytes_written
            );
        }
        Command::Pack(args) => {
            let genes = match &args.counts {
                Some(path) => {
                    let counts = normalize_counts(
                        CountsInput::Single(path),
                        args.gene_id_column.as_deref(),
                        &args.input,
                    )?;
                    collect_gene_ids(&counts.path, &counts.gene_id_column)?
                }
                None => BTreeSet::new(),
            };
            let summary = pack_report(&args.input, &args.report_name, &genes, &LogNotifier)?;
            tracing::info!("report written to {}", summary.path.display());
        }
        Command::Unpack(args) => {
            let out = args.out.unwrap_or_else(|| default_unpack_dir(&args.report));
            let summary = unpack_report(&args.report, &out)?;
            tracing::info!(
                "unpacked {} files of '{}' into {}",
                summary.files.len(),
                summary.report_name,
                summary.out_dir.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
