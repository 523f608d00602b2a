//! The final batch reports: re-aggregate the harvested typing artifacts
//! and write the three synchronized summary views.

use crate::orchestrate::ModuleStatus;
use ab_aggr::{aggregate, narrative, read_structured, verify_agreement, write_delimited, write_structured};
use ab_types::locus::LocusRecord;
use ab_types::mlst::{MlstScheme, SequenceTypeRecord};
use ab_types::tabular::TabularReport;
use ab_types::{AnalysisModule, GenomeStatus};
use anyhow::{Context, Result};
use itertools::Itertools;
use std::fmt::Write as _;
use std::path::Path;

/// Directory under the output root holding the final reports.
pub const SUMMARY_DIR: &str = "batch_summary_reports";

/// Rebuild the batch summary from the harvested artifacts and write
/// `batch_summary.json`, `batch_summary_full.tsv`, and
/// `batch_summary_report.txt` under [`SUMMARY_DIR`].
///
/// The locus data is re-parsed from the harvested `Kaptive_summary.tsv`;
/// per-genome statuses and the reference counts come from the structured
/// `Kaptive_summary.json` when present. The rebuilt summary must agree
/// with the module's own counts.
pub fn write_batch_reports(
    output_root: &Path,
    modules: &[(AnalysisModule, ModuleStatus)],
) -> Result<()> {
    let kaptive_dir = output_root.join("kaptive_results");
    let report = TabularReport::read(&kaptive_dir.join("Kaptive_summary.tsv"))?;
    let records = LocusRecord::from_summary_report(&report);

    let structured_path = kaptive_dir.join("Kaptive_summary.json");
    let structured = if structured_path.exists() {
        Some(read_structured(&structured_path)?)
    } else {
        None
    };

    // Genome order: the structured view's order, then any genome that only
    // appears in the tabular data.
    let mut genomes: Vec<(String, GenomeStatus, Vec<LocusRecord>)> = Vec::new();
    if let Some(structured) = &structured {
        for entry in &structured.summary.genomes {
            genomes.push((
                entry.genome.clone(),
                entry.status.clone(),
                records_for(&records, &entry.genome),
            ));
        }
    }
    for genome in records.iter().map(|r| r.genome.as_str()).unique() {
        if !genomes.iter().any(|(g, _, _)| g == genome) {
            genomes.push((
                genome.to_string(),
                GenomeStatus::Success,
                records_for(&records, genome),
            ));
        }
    }

    let summary = aggregate(&genomes);
    summary.verify()?;
    if let Some(structured) = &structured {
        verify_agreement(&summary, &structured.summary)?;
    }

    let dir = output_root.join(SUMMARY_DIR);
    std::fs::create_dir_all(&dir).with_context(|| dir.display().to_string())?;
    write_structured(&summary, &dir.join("batch_summary.json"), "abscope")?;
    write_delimited(&summary, &dir.join("batch_summary_full.tsv"))?;

    let mut text = narrative(&summary, "A. baumannii batch typing summary");
    text.push_str(&module_section(modules));
    text.push_str(&mlst_section(output_root)?);
    let path = dir.join("batch_summary_report.txt");
    std::fs::write(&path, text).with_context(|| path.display().to_string())?;
    Ok(())
}

fn records_for(records: &[LocusRecord], genome: &str) -> Vec<LocusRecord> {
    records
        .iter()
        .filter(|r| r.genome == genome)
        .cloned()
        .collect()
}

fn module_section(modules: &[(AnalysisModule, ModuleStatus)]) -> String {
    if modules.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "Module outcomes:");
    for (module, status) in modules {
        let _ = writeln!(out, "  {module}: {status}");
    }
    out
}

/// Sequence types from the harvested MLST summaries; either summary may
/// legitimately be absent (scheme skipped or module failed).
fn mlst_section(output_root: &Path) -> Result<String> {
    let mut out = String::new();
    for scheme in [MlstScheme::Pasteur, MlstScheme::Oxford] {
        let report = TabularReport::read_or_empty(&output_root.join(scheme.summary_name()))?;
        let records = SequenceTypeRecord::from_summary_report(&report, scheme);
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "MLST sequence types ({scheme} scheme):");
        for record in records {
            let st = match &record.sequence_type {
                Some(st) => format!("ST {st}"),
                None => "unassigned".to_string(),
            };
            let alleles = record
                .alleles
                .iter()
                .map(|(gene, allele)| format!("{gene}({allele})"))
                .join("-");
            if alleles.is_empty() {
                let _ = writeln!(out, "  {}: {st}", record.genome);
            } else {
                let _ = writeln!(out, "  {}: {st} [{alleles}]", record.genome);
            }
        }
    }
    Ok(out)
}
