use std::collections::BTreeSet;
use std::path::Path;

use crate::notify::Notifier;
use crate::report::ReportError;
use crate::report::pack::{PackSummary, pack_report};

pub fn write_report(
    output_dir: &Path,
    report_name: &str,
    genes: &BTreeSet<String>,
    notifier: &dyn Notifier,
) -> Result<PackSummary, ReportError> {
    tracing::info!("Generating the report");
    let summary = pack_report(output_dir, report_name, genes, notifier)?;
    for contrast in &summary.contrasts {
        tracing::debug!(
            "contrast {}: table {}, MA plot {}, volcano plot {}",
            contrast.id,
            contrast.table.display(),
            contrast.ma_plot.display(),
            contrast.volcano_plot.display()
        );
    }
    Ok(summary)
}
