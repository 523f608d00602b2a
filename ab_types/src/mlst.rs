//! Sequence-type records from the MLST module.

use crate::tabular::TabularReport;
use crate::GenomeScoped;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

/// MLST typing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "lowercase")]
pub enum MlstScheme {
    #[strum(to_string = "pasteur")]
    Pasteur,
    #[strum(to_string = "oxford")]
    Oxford,
}

impl MlstScheme {
    /// The working directory the MLST module writes under for this scheme.
    pub fn output_subdir(&self) -> &'static str {
        match self {
            MlstScheme::Pasteur => "mlst_pasteur_results",
            MlstScheme::Oxford => "mlst_oxford_results",
        }
    }

    /// Canonical summary report artifact name.
    pub fn summary_name(&self) -> &'static str {
        match self {
            MlstScheme::Pasteur => "pasteur_mlst_summary.tsv",
            MlstScheme::Oxford => "oxford_mlst_summary.tsv",
        }
    }
}

/// One genome's sequence-type call under one scheme. The second tagged
/// record variant next to [`crate::locus::LocusRecord`], sharing the same
/// genome-scoped base shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceTypeRecord {
    pub genome: String,
    pub scheme: MlstScheme,
    /// `None` when the tool could not assign a type.
    pub sequence_type: Option<String>,
    /// `(locus, allele)` pairs; unresolved alleles are recorded as `?`.
    pub alleles: Vec<(String, String)>,
}

impl SequenceTypeRecord {
    /// Parse records out of a harvested MLST summary table. Expected
    /// columns: `Genome`, `ST`, `Allele_Profile` (extra columns ignored,
    /// missing ones tolerated).
    pub fn from_summary_report(
        report: &TabularReport,
        scheme: MlstScheme,
    ) -> Vec<SequenceTypeRecord> {
        report
            .rows
            .iter()
            .filter_map(|row| {
                let genome = report.value(row, "Genome");
                if genome.is_empty() {
                    return None;
                }
                Some(SequenceTypeRecord {
                    genome: genome.to_string(),
                    scheme,
                    sequence_type: normalize_st(report.value(row, "ST")),
                    alleles: parse_allele_profile(report.value(row, "Allele_Profile")),
                })
            })
            .collect()
    }

    /// Whether a sequence type was assigned (the high-confidence case).
    pub fn assigned(&self) -> bool {
        self.sequence_type.is_some()
    }
}

impl GenomeScoped for SequenceTypeRecord {
    fn genome(&self) -> &str {
        &self.genome
    }
}

/// Normalize the raw ST field: `-`, `0`, empty, or `UNKNOWN` mean
/// unassigned; an `ST` prefix is stripped.
pub fn normalize_st(raw: &str) -> Option<String> {
    match raw.trim() {
        "" | "-" | "0" | "UNKNOWN" => None,
        st => Some(st.strip_prefix("ST").unwrap_or(st).to_string()),
    }
}

/// Parse a `gene1(1)-gene2(3)-...` allele profile; a bare gene name is
/// recorded with an unresolved `?` allele.
pub fn parse_allele_profile(profile: &str) -> Vec<(String, String)> {
    profile
        .split('-')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match part.split_once('(') {
                Some((gene, rest)) => Some((
                    gene.trim().to_string(),
                    rest.trim_end_matches(')').trim().to_string(),
                )),
                None => Some((part.to_string(), "?".to_string())),
            }
        })
        .collect()
}
