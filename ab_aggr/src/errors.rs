use thiserror::Error;

/// Integrity violations between the synchronized summary views. These are
/// hard invariants: the structured, delimited, and narrative views must
/// never disagree on a count.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryIntegrityError {
    #[error("record total {total} does not equal the sum of per-kind counts {kind_sum}")]
    KindCountMismatch { total: usize, kind_sum: usize },

    #[error(
        "tracked both-kinds genome count {tracked} does not match the \
         per-genome intersection {intersection}"
    )]
    BothCountMismatch { tracked: usize, intersection: usize },

    #[error("genome partition {success} + {failed} does not cover {total} genomes")]
    PartitionMismatch {
        total: usize,
        success: usize,
        failed: usize,
    },

    #[error("views disagree on {field}: {left} vs {right}")]
    ViewDisagreement {
        field: &'static str,
        left: usize,
        right: usize,
    },
}
