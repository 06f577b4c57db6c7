use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::{
    ConditionsSource, ConfigError, CountTableSource, RunEnv, RunParams, resolve_output_dir,
};
use crate::input::conditions::{
    ConditionTable, ConditionsInput, MANUAL_CONDITION_COLUMN, NormalizedConditions,
    normalize_conditions,
};
use crate::input::counts::{CountsInput, NormalizedCounts, collect_gene_ids, normalize_counts};
use crate::model::design::{DesignFormula, split_design_formula};
use crate::pipeline::RunError;

#[derive(Debug, Clone)]
pub struct Stage1Output {
    pub design: DesignFormula,
    pub counts: NormalizedCounts,
    pub conditions: NormalizedConditions,
    pub condition_table: ConditionTable,
    pub genes: BTreeSet<String>,
    pub output_dir: PathBuf,
}

pub fn run_stage1(params: &RunParams, env: &RunEnv) -> Result<Stage1Output, RunError> {
    if params.report_name.trim().is_empty() {
        return Err(ConfigError::MissingReportName.into());
    }

    // Manual entry only ever produces the single condition column.
    let manual_formula;
    let formula_terms = match params.conditions_source {
        ConditionsSource::Manual => {
            manual_formula = vec![(
                MANUAL_CONDITION_COLUMN.to_string(),
                "explanatory".to_string(),
            )];
            &manual_formula
        }
        ConditionsSource::Table => &params.design_formula,
    };
    let design = split_design_formula(formula_terms)?;

    let counts_input = match params.count_table_source {
        CountTableSource::Single => CountsInput::Single(
            params
                .raw_count_table
                .as_deref()
                .ok_or(ConfigError::MissingCountTable)?,
        ),
        CountTableSource::Multiple => CountsInput::Merge(&params.raw_count_tables),
    };
    let counts = normalize_counts(
        counts_input,
        params.count_table_gene_id_column.as_deref(),
        &env.work_dir,
    )?;

    let output_dir = resolve_output_dir(params, &env.output_root)?;
    let conditions_input = match params.conditions_source {
        ConditionsSource::Manual => ConditionsInput::Manual(&params.manual_conditions),
        ConditionsSource::Table => ConditionsInput::Table(params.conditions_table.as_deref()),
    };

    tracing::info!(">>> Parameters");
    tracing::info!("Count table: '{}'", params.count_table_label());
    tracing::info!("Report name: '{}'", params.report_name);
    tracing::info!("Number of Genes: '{}'", params.number_of_genes_to_plot);
    tracing::info!(
        "Output location: '{}' [{}]",
        output_dir.display(),
        params.output_location_type.as_str()
    );
    if let ConditionsInput::Table(Some(path)) = conditions_input {
        tracing::info!("Design matrix file: '{}'", path.display());
    }

    let conditions =
        normalize_conditions(conditions_input, params.sample_id_column(), &env.work_dir)?;
    let genes = collect_gene_ids(&counts.path, &counts.gene_id_column)?;
    tracing::info!(
        "{} genes in column '{}' of {}",
        genes.len(),
        counts.gene_id_column,
        counts.path.display()
    );

    tracing::info!(
        "Design matrix: [{}]",
        match params.conditions_source {
            ConditionsSource::Table => "table file",
            ConditionsSource::Manual => "manual input",
        }
    );
    let condition_table = match params.conditions_source {
        ConditionsSource::Manual => ConditionTable::from_manual(&params.manual_conditions)?,
        ConditionsSource::Table => {
            ConditionTable::load(&conditions.path, &conditions.sample_id_column)?
        }
    };
    for term in design.missing_terms(&condition_table) {
        tracing::warn!("design term '{term}' is not a column of the design matrix");
    }

    Ok(Stage1Output {
        design,
        counts,
        conditions,
        condition_table,
        genes,
        output_dir,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_inputs.rs"]
mod tests;
