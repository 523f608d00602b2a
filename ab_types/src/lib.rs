//! Shared types for the abscope typing pipeline: the artifact registry,
//! module descriptors and run outcomes, tabular tool output, and the typed
//! per-module sample records.

pub mod artifact;
pub mod locus;
pub mod mlst;
pub mod module;
pub mod tabular;

pub use artifact::{ArtifactEntry, ArtifactKind, ArtifactRegistry};
pub use module::{AnalysisModule, FilePattern, GenomeStatus, ModuleDescriptor, ModuleRun, RunOutcome};

/// Common shape shared by every per-module sample record: each record is
/// scoped to exactly one genome, set at construction and never overwritten.
pub trait GenomeScoped {
    /// The originating genome identifier (assembly file stem).
    fn genome(&self) -> &str;
}
