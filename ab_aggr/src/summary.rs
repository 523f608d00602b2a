//! Aggregation of per-genome locus records into a [`BatchSummary`].

use crate::errors::SummaryIntegrityError;
use ab_types::locus::{LocusKind, LocusRecord};
use ab_types::GenomeStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How many ranked type labels the structured view carries.
pub const TOP_TYPES: usize = 5;

/// Per-genome aggregation entry retained in the summary, including failed
/// genomes (which contribute zero to every count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeSummary {
    pub genome: String,
    #[serde(flatten)]
    pub status: GenomeStatus,
    pub record_count: usize,
    pub capsule_count: usize,
    pub surface_count: usize,
    /// Distinct capsule type labels observed for this genome, sorted.
    pub capsule_types: Vec<String>,
    /// Distinct outer-core type labels observed for this genome, sorted.
    pub surface_types: Vec<String>,
}

/// A ranked type label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub label: String,
    pub count: usize,
}

/// Aggregated counts and distributions for one batch.
///
/// Invariants, checked by [`BatchSummary::verify`]:
/// `total_records == capsule + surface + unknown` and `genomes_with_both`
/// equals the exact intersection of the two per-kind genome sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_genomes: usize,
    pub successful_genomes: usize,
    pub failed_genomes: usize,
    pub total_records: usize,
    pub capsule_records: usize,
    pub surface_records: usize,
    pub unknown_records: usize,
    pub genomes_with_capsule: usize,
    pub genomes_with_surface: usize,
    /// Tracked explicitly, never re-derived from the two marginals.
    pub genomes_with_both: usize,
    pub capsule_type_distribution: BTreeMap<String, usize>,
    pub surface_type_distribution: BTreeMap<String, usize>,
    pub genomes: Vec<GenomeSummary>,
    /// Full record list backing the delimited view; not part of the
    /// structured view.
    #[serde(skip)]
    pub records: Vec<LocusRecord>,
}

/// Aggregate ordered per-genome results into a batch summary.
///
/// Only the first record of each kind per genome contributes that genome's
/// representative label to the type distributions; additional hits of the
/// same kind count toward totals but not the distribution. Failed genomes
/// are retained in the per-genome list with their failure reason.
pub fn aggregate(genomes: &[(String, GenomeStatus, Vec<LocusRecord>)]) -> BatchSummary {
    let mut summary = BatchSummary {
        total_genomes: genomes.len(),
        ..BatchSummary::default()
    };

    for (genome, status, records) in genomes {
        if let GenomeStatus::Failed { .. } = status {
            summary.failed_genomes += 1;
            summary.genomes.push(GenomeSummary {
                genome: genome.clone(),
                status: status.clone(),
                record_count: 0,
                capsule_count: 0,
                surface_count: 0,
                capsule_types: vec![],
                surface_types: vec![],
            });
            continue;
        }
        summary.successful_genomes += 1;

        let capsule: Vec<&LocusRecord> = by_kind(records, LocusKind::Capsule);
        let surface: Vec<&LocusRecord> = by_kind(records, LocusKind::SurfacePolysaccharide);

        summary.total_records += records.len();
        summary.capsule_records += capsule.len();
        summary.surface_records += surface.len();
        summary.unknown_records += records.len() - capsule.len() - surface.len();

        if let Some(first) = capsule.first() {
            summary.genomes_with_capsule += 1;
            *summary
                .capsule_type_distribution
                .entry(first.best_match_type.clone())
                .or_insert(0) += 1;
        }
        if let Some(first) = surface.first() {
            summary.genomes_with_surface += 1;
            *summary
                .surface_type_distribution
                .entry(first.best_match_type.clone())
                .or_insert(0) += 1;
        }
        if !capsule.is_empty() && !surface.is_empty() {
            summary.genomes_with_both += 1;
        }

        summary.genomes.push(GenomeSummary {
            genome: genome.clone(),
            status: GenomeStatus::Success,
            record_count: records.len(),
            capsule_count: capsule.len(),
            surface_count: surface.len(),
            capsule_types: distinct_types(&capsule),
            surface_types: distinct_types(&surface),
        });
        summary.records.extend(records.iter().cloned());
    }
    summary
}

fn by_kind(records: &[LocusRecord], kind: LocusKind) -> Vec<&LocusRecord> {
    records.iter().filter(|r| r.kind == kind).collect()
}

fn distinct_types(records: &[&LocusRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.best_match_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl BatchSummary {
    /// Top `n` labels of a distribution: descending count, ties broken by
    /// ascending label text.
    pub fn top_capsule_types(&self, n: usize) -> Vec<TypeCount> {
        top_n(&self.capsule_type_distribution, n)
    }

    pub fn top_surface_types(&self, n: usize) -> Vec<TypeCount> {
        top_n(&self.surface_type_distribution, n)
    }

    /// Check the hard counting invariants.
    pub fn verify(&self) -> Result<(), SummaryIntegrityError> {
        let kind_sum = self.capsule_records + self.surface_records + self.unknown_records;
        if kind_sum != self.total_records {
            return Err(SummaryIntegrityError::KindCountMismatch {
                total: self.total_records,
                kind_sum,
            });
        }
        if self.successful_genomes + self.failed_genomes != self.total_genomes {
            return Err(SummaryIntegrityError::PartitionMismatch {
                total: self.total_genomes,
                success: self.successful_genomes,
                failed: self.failed_genomes,
            });
        }
        let intersection = self
            .genomes
            .iter()
            .filter(|g| g.capsule_count > 0 && g.surface_count > 0)
            .count();
        if intersection != self.genomes_with_both {
            return Err(SummaryIntegrityError::BothCountMismatch {
                tracked: self.genomes_with_both,
                intersection,
            });
        }
        Ok(())
    }
}

fn top_n(distribution: &BTreeMap<String, usize>, n: usize) -> Vec<TypeCount> {
    // BTreeMap iterates labels in ascending order; the stable sort keeps
    // that order for equal counts.
    let mut ranked: Vec<TypeCount> = distribution
        .iter()
        .map(|(label, &count)| TypeCount {
            label: label.clone(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_types::tabular::TabularReport;
    use pretty_assertions::assert_eq;

    fn record(genome: &str, locus: &str, label: &str) -> LocusRecord {
        let text = format!(
            "Genome\tBest match locus\tBest match type\n{genome}\t{locus}\t{label}\n"
        );
        LocusRecord::from_summary_report(&TabularReport::parse(&text)).remove(0)
    }

    fn sample_batch() -> Vec<(String, GenomeStatus, Vec<LocusRecord>)> {
        vec![
            (
                "g1".to_string(),
                GenomeStatus::Success,
                vec![
                    record("g1", "KL3", "K3"),
                    record("g1", "KL2", "K2"), // second capsule hit: counted, not representative
                    record("g1", "OCL1", "OC1"),
                ],
            ),
            (
                "g2".to_string(),
                GenomeStatus::Success,
                vec![record("g2", "KL3", "K3"), record("g2", "novel", "")],
            ),
            (
                "g3".to_string(),
                GenomeStatus::Failed {
                    reason: "kaptive exited with status 1".to_string(),
                },
                vec![],
            ),
        ]
    }

    #[test]
    fn counts_satisfy_the_invariants() {
        let summary = aggregate(&sample_batch());
        assert_eq!(summary.total_genomes, 3);
        assert_eq!(summary.successful_genomes, 2);
        assert_eq!(summary.failed_genomes, 1);
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.capsule_records, 3);
        assert_eq!(summary.surface_records, 1);
        assert_eq!(summary.unknown_records, 1);
        assert_eq!(summary.genomes_with_capsule, 2);
        assert_eq!(summary.genomes_with_surface, 1);
        assert_eq!(summary.genomes_with_both, 1);
        summary.verify().unwrap();
    }

    #[test]
    fn first_record_per_kind_is_the_representative() {
        let summary = aggregate(&sample_batch());
        // g1's second capsule hit (K2) must not appear in the distribution.
        assert_eq!(
            summary.capsule_type_distribution,
            BTreeMap::from([("K3".to_string(), 2)])
        );
    }

    #[test]
    fn failed_genomes_are_retained_with_zero_counts() {
        let summary = aggregate(&sample_batch());
        let failed = &summary.genomes[2];
        assert_eq!(failed.genome, "g3");
        assert_eq!(
            failed.status,
            GenomeStatus::Failed {
                reason: "kaptive exited with status 1".to_string()
            }
        );
        assert_eq!(failed.record_count, 0);
    }

    #[test]
    fn top_n_breaks_ties_by_ascending_label() {
        let distribution = BTreeMap::from([
            ("K3".to_string(), 2),
            ("K2".to_string(), 2),
            ("K9".to_string(), 1),
        ]);
        let ranked = top_n(&distribution, 2);
        assert_eq!(
            ranked,
            [
                TypeCount {
                    label: "K2".to_string(),
                    count: 2
                },
                TypeCount {
                    label: "K3".to_string(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn verify_rejects_tampered_counts() {
        let mut summary = aggregate(&sample_batch());
        summary.genomes_with_both = 2;
        assert_eq!(
            summary.verify(),
            Err(SummaryIntegrityError::BothCountMismatch {
                tracked: 2,
                intersection: 1
            })
        );
    }
}
