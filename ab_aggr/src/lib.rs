//! Cross-sample aggregation of typing results into a batch summary and its
//! three synchronized views (structured, delimited, narrative).

pub mod errors;
pub mod summary;
pub mod views;

pub use errors::SummaryIntegrityError;
pub use summary::{aggregate, BatchSummary, GenomeSummary, TypeCount};
pub use views::{
    narrative, read_structured, verify_agreement, write_delimited, write_structured,
    StructuredSummary, SummaryMetadata,
};
