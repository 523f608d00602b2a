//! Typed records for the K/OC surface-structure locus typing module.

use crate::tabular::TabularReport;
use crate::GenomeScoped;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

/// Column names of the kaptive assembly report consumed here.
pub const GENOME_COLUMN: &str = "Genome";
pub const BEST_MATCH_LOCUS_COLUMN: &str = "Best match locus";
pub const BEST_MATCH_TYPE_COLUMN: &str = "Best match type";
pub const CONFIDENCE_COLUMN: &str = "Match confidence";
pub const PROBLEMS_COLUMN: &str = "Problems";
pub const IDENTITY_COLUMN: &str = "Identity";
pub const COVERAGE_COLUMN: &str = "Coverage";
pub const GENE_DETAILS_COLUMN: &str = "Expected genes in locus, details";

/// Which surface-structure locus a hit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
pub enum LocusKind {
    /// Capsule (K) locus, `KL*` names.
    #[strum(to_string = "K")]
    #[serde(rename = "K")]
    Capsule,
    /// Outer-core polysaccharide (OC) locus, `OCL*` names.
    #[strum(to_string = "OC")]
    #[serde(rename = "OC")]
    SurfacePolysaccharide,
    #[strum(to_string = "unknown")]
    #[serde(rename = "unknown")]
    Unknown,
}

impl LocusKind {
    /// Classify from the best-match locus label.
    pub fn from_best_match(locus: &str) -> LocusKind {
        if locus.contains("KL") {
            LocusKind::Capsule
        } else if locus.contains("OCL") {
            LocusKind::SurfacePolysaccharide
        } else {
            LocusKind::Unknown
        }
    }
}

/// One expected-gene entry parsed out of the packed details field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneMatch {
    pub name: String,
    /// Percent identity.
    pub identity: f64,
    /// Percent coverage.
    pub coverage: f64,
}

/// Parse the packed `name,identity%,coverage%;...` field. Malformed
/// triples are skipped individually; they never abort the whole field.
pub fn parse_gene_details(packed: &str) -> Vec<GeneMatch> {
    packed
        .split(';')
        .filter_map(|part| {
            let mut fields = part.split(',');
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let identity = parse_percent(fields.next()?)?;
            let coverage = parse_percent(fields.next()?)?;
            Some(GeneMatch {
                name: name.to_string(),
                identity,
                coverage,
            })
        })
        .collect()
}

fn parse_percent(field: &str) -> Option<f64> {
    field.trim().trim_end_matches('%').parse().ok()
}

/// One row of kaptive output for one genome, tagged with its locus kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocusRecord {
    /// Originating genome identifier; set at construction, exactly once.
    pub genome: String,
    pub kind: LocusKind,
    pub best_match_locus: String,
    pub best_match_type: String,
    pub confidence: String,
    pub problems: String,
    pub identity: String,
    pub coverage: String,
    pub genes: Vec<GeneMatch>,
}

impl LocusRecord {
    /// Build records from a per-genome merged report. The genome identifier
    /// is stamped onto every record here.
    pub fn from_report(genome: &str, report: &TabularReport) -> Vec<LocusRecord> {
        report
            .rows
            .iter()
            .map(|row| LocusRecord::from_row(genome.to_string(), report, row))
            .collect()
    }

    /// Re-read records out of a batch summary table carrying a
    /// [`GENOME_COLUMN`] column.
    pub fn from_summary_report(report: &TabularReport) -> Vec<LocusRecord> {
        report
            .rows
            .iter()
            .map(|row| {
                let genome = report.value(row, GENOME_COLUMN).to_string();
                LocusRecord::from_row(genome, report, row)
            })
            .collect()
    }

    fn from_row(genome: String, report: &TabularReport, row: &[String]) -> LocusRecord {
        let best_match_locus = report.value(row, BEST_MATCH_LOCUS_COLUMN).to_string();
        LocusRecord {
            kind: LocusKind::from_best_match(&best_match_locus),
            best_match_type: report.value(row, BEST_MATCH_TYPE_COLUMN).to_string(),
            confidence: report.value(row, CONFIDENCE_COLUMN).to_string(),
            problems: report.value(row, PROBLEMS_COLUMN).to_string(),
            identity: report.value(row, IDENTITY_COLUMN).to_string(),
            coverage: report.value(row, COVERAGE_COLUMN).to_string(),
            genes: parse_gene_details(report.value(row, GENE_DETAILS_COLUMN)),
            best_match_locus,
            genome,
        }
    }

    /// Re-pack the gene sub-features into the wire form.
    pub fn gene_details_packed(&self) -> String {
        self.genes
            .iter()
            .map(|g| format!("{},{}%,{}%", g.name, g.identity, g.coverage))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl GenomeScoped for LocusRecord {
    fn genome(&self) -> &str {
        &self.genome
    }
}
