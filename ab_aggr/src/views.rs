//! The three synchronized views of a [`BatchSummary`]: structured (JSON),
//! delimited (TSV), and narrative (plain text). All three are derived from
//! the same summary instance and must agree on every count.

use crate::errors::SummaryIntegrityError;
use crate::summary::{BatchSummary, TypeCount, TOP_TYPES};
use ab_types::locus::{
    BEST_MATCH_LOCUS_COLUMN, BEST_MATCH_TYPE_COLUMN, CONFIDENCE_COLUMN, COVERAGE_COLUMN,
    GENE_DETAILS_COLUMN, GENOME_COLUMN, IDENTITY_COLUMN, PROBLEMS_COLUMN,
};
use ab_types::tabular::sanitize_field;
use ab_types::GenomeStatus;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Provenance block of the structured view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub tool: String,
    pub version: String,
    pub total_genomes: usize,
}

/// The structured (JSON) view: metadata plus the summary counts, per-genome
/// entries, and the ranked common-type lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub metadata: SummaryMetadata,
    pub common_capsule_types: Vec<TypeCount>,
    pub common_surface_types: Vec<TypeCount>,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

impl StructuredSummary {
    pub fn new(summary: &BatchSummary, tool: &str) -> StructuredSummary {
        StructuredSummary {
            metadata: SummaryMetadata {
                tool: tool.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                total_genomes: summary.total_genomes,
            },
            common_capsule_types: summary.top_capsule_types(TOP_TYPES),
            common_surface_types: summary.top_surface_types(TOP_TYPES),
            summary: summary.clone(),
        }
    }
}

/// Write the structured view.
pub fn write_structured(summary: &BatchSummary, path: &Path, tool: &str) -> Result<()> {
    let file = File::create(path).with_context(|| path.display().to_string())?;
    serde_json::to_writer_pretty(file, &StructuredSummary::new(summary, tool))
        .with_context(|| format!("error serializing batch summary to {}", path.display()))?;
    Ok(())
}

/// Read a structured view back; the full record list is not part of this
/// view and comes back empty.
pub fn read_structured(path: &Path) -> Result<StructuredSummary> {
    let file = File::open(path).with_context(|| path.display().to_string())?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("error parsing batch summary {}", path.display()))
}

/// Write the delimited full-data view: one row per locus record, tagged
/// with its originating genome.
pub fn write_delimited(summary: &BatchSummary, path: &Path) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)
        .with_context(|| path.display().to_string())?;
    wtr.write_record([
        GENOME_COLUMN,
        "Locus kind",
        BEST_MATCH_LOCUS_COLUMN,
        BEST_MATCH_TYPE_COLUMN,
        CONFIDENCE_COLUMN,
        PROBLEMS_COLUMN,
        IDENTITY_COLUMN,
        COVERAGE_COLUMN,
        GENE_DETAILS_COLUMN,
    ])?;
    for record in &summary.records {
        wtr.write_record(
            [
                record.genome.as_str(),
                &record.kind.to_string(),
                &record.best_match_locus,
                &record.best_match_type,
                &record.confidence,
                &record.problems,
                &record.identity,
                &record.coverage,
                &record.gene_details_packed(),
            ]
            .iter()
            .map(|f| sanitize_field(f)),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render the narrative view. Every figure printed here comes straight
/// from the summary counts, so it cannot drift from the other views.
pub fn narrative(summary: &BatchSummary, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.len()));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Genomes analyzed: {} ({} success, {} failed)",
        summary.total_genomes, summary.successful_genomes, summary.failed_genomes
    );
    let _ = writeln!(
        out,
        "Locus hits: {} (capsule {}, outer core {}, unknown {})",
        summary.total_records,
        summary.capsule_records,
        summary.surface_records,
        summary.unknown_records
    );
    let _ = writeln!(
        out,
        "Genomes with a capsule (K) locus: {}",
        summary.genomes_with_capsule
    );
    let _ = writeln!(
        out,
        "Genomes with an outer-core (OC) locus: {}",
        summary.genomes_with_surface
    );
    let _ = writeln!(out, "Genomes with both: {}", summary.genomes_with_both);

    for (heading, ranked) in [
        ("Most common capsule types:", summary.top_capsule_types(TOP_TYPES)),
        ("Most common outer-core types:", summary.top_surface_types(TOP_TYPES)),
    ] {
        if !ranked.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{heading}");
            for TypeCount { label, count } in ranked {
                let _ = writeln!(out, "  {label}\t{count}");
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Per-genome results:");
    for genome in &summary.genomes {
        match &genome.status {
            GenomeStatus::Success => {
                let mut labels: Vec<&str> =
                    genome.capsule_types.iter().map(String::as_str).collect();
                labels.extend(genome.surface_types.iter().map(String::as_str));
                let _ = writeln!(
                    out,
                    "  {}: success, {} hits [{}]",
                    genome.genome,
                    genome.record_count,
                    labels.join(", ")
                );
            }
            GenomeStatus::Failed { reason } => {
                let _ = writeln!(out, "  {}: failed ({reason})", genome.genome);
            }
        }
    }
    out
}

/// Check that two views of the same batch agree on every count.
pub fn verify_agreement(
    left: &BatchSummary,
    right: &BatchSummary,
) -> Result<(), SummaryIntegrityError> {
    let fields: [(&'static str, usize, usize); 10] = [
        ("total_genomes", left.total_genomes, right.total_genomes),
        ("successful_genomes", left.successful_genomes, right.successful_genomes),
        ("failed_genomes", left.failed_genomes, right.failed_genomes),
        ("total_records", left.total_records, right.total_records),
        ("capsule_records", left.capsule_records, right.capsule_records),
        ("surface_records", left.surface_records, right.surface_records),
        ("unknown_records", left.unknown_records, right.unknown_records),
        ("genomes_with_capsule", left.genomes_with_capsule, right.genomes_with_capsule),
        ("genomes_with_surface", left.genomes_with_surface, right.genomes_with_surface),
        ("genomes_with_both", left.genomes_with_both, right.genomes_with_both),
    ];
    for (field, l, r) in fields {
        if l != r {
            return Err(SummaryIntegrityError::ViewDisagreement {
                field,
                left: l,
                right: r,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::aggregate;
    use ab_types::locus::LocusRecord;
    use ab_types::tabular::TabularReport;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_summary() -> BatchSummary {
        let text = "Genome\tBest match locus\tBest match type\tMatch confidence\tExpected genes in locus, details\n\
            g1\tKL3\tK3\tVery high\twzc,99.1%,100%\n\
            g1\tOCL1\tOC1\tHigh\t\n\
            g2\tKL3\tK3\tLow\t\n";
        let records = LocusRecord::from_summary_report(&TabularReport::parse(text));
        let genomes = vec![
            (
                "g1".to_string(),
                GenomeStatus::Success,
                records[..2].to_vec(),
            ),
            (
                "g2".to_string(),
                GenomeStatus::Success,
                records[2..].to_vec(),
            ),
            (
                "g3".to_string(),
                GenomeStatus::Failed {
                    reason: "tool missing".to_string(),
                },
                vec![],
            ),
        ];
        aggregate(&genomes)
    }

    #[test]
    fn structured_view_round_trips_the_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        let summary = sample_summary();
        write_structured(&summary, &path, "ab_kaptive").unwrap();

        let restored = read_structured(&path).unwrap();
        assert_eq!(restored.metadata.tool, "ab_kaptive");
        assert_eq!(restored.metadata.total_genomes, 3);
        verify_agreement(&restored.summary, &summary).unwrap();
        restored.summary.verify().unwrap();
        assert_eq!(restored.summary.genomes, summary.genomes);
    }

    #[test]
    fn delimited_view_reproduces_the_tabular_totals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.tsv");
        let summary = sample_summary();
        write_delimited(&summary, &path).unwrap();

        let report = TabularReport::read(&path).unwrap();
        assert_eq!(report.rows.len(), summary.total_records);
        let records = LocusRecord::from_summary_report(&report);
        let genomes = vec![
            ("g1".to_string(), GenomeStatus::Success, records[..2].to_vec()),
            ("g2".to_string(), GenomeStatus::Success, records[2..].to_vec()),
        ];
        let rebuilt = aggregate(&genomes);
        assert_eq!(rebuilt.total_records, summary.total_records);
        assert_eq!(rebuilt.capsule_records, summary.capsule_records);
        assert_eq!(rebuilt.surface_records, summary.surface_records);
        assert_eq!(rebuilt.genomes_with_both, summary.genomes_with_both);
        // Gene sub-features survive the packed wire form.
        assert_eq!(records[0].genes.len(), 1);
        assert_eq!(records[0].genes[0].name, "wzc");
    }

    #[test]
    fn narrative_view_prints_the_same_counts() {
        let summary = sample_summary();
        let text = narrative(&summary, "K/OC LOCUS TYPING SUMMARY");
        assert!(text.contains("Genomes analyzed: 3 (2 success, 1 failed)"));
        assert!(text.contains("Locus hits: 3 (capsule 2, outer core 1, unknown 0)"));
        assert!(text.contains("Genomes with both: 1"));
        assert!(text.contains("  K3\t2"));
        assert!(text.contains("g3: failed (tool missing)"));
    }

    #[test]
    fn every_genome_marginal_is_compared() {
        let summary = sample_summary();
        let mut other = summary.clone();
        other.genomes_with_surface += 1;
        assert_eq!(
            verify_agreement(&summary, &other),
            Err(SummaryIntegrityError::ViewDisagreement {
                field: "genomes_with_surface",
                left: summary.genomes_with_surface,
                right: summary.genomes_with_surface + 1,
            })
        );
    }

    #[test]
    fn disagreeing_views_are_rejected() {
        let summary = sample_summary();
        let mut other = summary.clone();
        other.total_records += 1;
        assert_eq!(
            verify_agreement(&summary, &other),
            Err(SummaryIntegrityError::ViewDisagreement {
                field: "total_records",
                left: summary.total_records,
                right: summary.total_records + 1,
            })
        );
    }
}
