//! Canonical artifact names and their locations.
//!
//! The registry is the single source of truth for "what a module produces"
//! and "what the final summary requires": the harvester and the summary
//! gate consult the same table, so the two can never drift apart.

use crate::module::AnalysisModule;
use std::path::{Path, PathBuf};

/// Whether an artifact is a whole directory or a single report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Directory,
    ReportFile,
}

/// One declared artifact: canonical name, where the module leaves it, and
/// where it lands in the canonical output tree.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub name: &'static str,
    pub module: AnalysisModule,
    source: &'static str,
    dest: &'static str,
    pub kind: ArtifactKind,
    pub critical: bool,
}

impl ArtifactEntry {
    pub fn new(
        name: &'static str,
        module: AnalysisModule,
        source: &'static str,
        dest: &'static str,
        kind: ArtifactKind,
        critical: bool,
    ) -> ArtifactEntry {
        ArtifactEntry {
            name,
            module,
            source,
            dest,
            kind,
            critical,
        }
    }

    /// Expected location inside the module workspace.
    pub fn source_in(&self, workspace: &Path) -> PathBuf {
        workspace.join(self.source)
    }

    /// Destination inside the canonical output tree.
    pub fn dest_in(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.dest)
    }

    /// Top-level workspace directory this artifact lives under, used for
    /// workspace restoration.
    pub fn workspace_top_dir(&self) -> &'static str {
        match self.source.split_once('/') {
            Some((top, _)) => top,
            None => self.source,
        }
    }
}

/// Immutable name → location table, constructed once and passed by
/// reference to the components that need it.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    entries: Vec<ArtifactEntry>,
}

impl ArtifactRegistry {
    pub fn new(entries: Vec<ArtifactEntry>) -> ArtifactRegistry {
        ArtifactRegistry { entries }
    }

    /// The full A. baumannii pipeline layout: exact, unversioned names.
    pub fn baumannii_layout() -> ArtifactRegistry {
        use AnalysisModule::{Abricate, Amr, Kaptive, MlstOxford, MlstPasteur, Qc};
        use ArtifactKind::{Directory, ReportFile};
        let e = ArtifactEntry::new;
        ArtifactRegistry::new(vec![
            e("fasta_qc_results", Qc, "fasta_qc_results", "fasta_qc_results", Directory, false),
            e(
                "PASTEUR_MLST",
                MlstPasteur,
                "mlst_pasteur_results/PASTEUR_MLST",
                "PASTEUR_MLST",
                Directory,
                false,
            ),
            e(
                "pasteur_mlst_summary.tsv",
                MlstPasteur,
                "mlst_pasteur_results/PASTEUR_MLST/pasteur_mlst_summary.tsv",
                "pasteur_mlst_summary.tsv",
                ReportFile,
                true,
            ),
            e(
                "OXFORD_MLST",
                MlstOxford,
                "mlst_oxford_results/OXFORD_MLST",
                "OXFORD_MLST",
                Directory,
                false,
            ),
            e(
                "oxford_mlst_summary.tsv",
                MlstOxford,
                "mlst_oxford_results/OXFORD_MLST/oxford_mlst_summary.tsv",
                "oxford_mlst_summary.tsv",
                ReportFile,
                true,
            ),
            e("kaptive_results", Kaptive, "kaptive_results", "kaptive_results", Directory, false),
            e(
                "Kaptive_summary.tsv",
                Kaptive,
                "kaptive_results/Kaptive_summary.tsv",
                "kaptive_results/Kaptive_summary.tsv",
                ReportFile,
                true,
            ),
            e(
                "Kaptive_summary.json",
                Kaptive,
                "kaptive_results/Kaptive_summary.json",
                "kaptive_results/Kaptive_summary.json",
                ReportFile,
                false,
            ),
            e("amrfinder_results", Amr, "amrfinder_results", "amrfinder_results", Directory, false),
            e(
                "amrfinder_summary.tsv",
                Amr,
                "amrfinder_results/amrfinder_summary.tsv",
                "amrfinder_results/amrfinder_summary.tsv",
                ReportFile,
                true,
            ),
            e("abricate_results", Abricate, "abricate_results", "abricate_results", Directory, false),
            e(
                "card_summary.tsv",
                Abricate,
                "abricate_results/card_summary.tsv",
                "abricate_results/card_summary.tsv",
                ReportFile,
                true,
            ),
            e(
                "ncbi_summary.tsv",
                Abricate,
                "abricate_results/ncbi_summary.tsv",
                "abricate_results/ncbi_summary.tsv",
                ReportFile,
                false,
            ),
            e(
                "resfinder_summary.tsv",
                Abricate,
                "abricate_results/resfinder_summary.tsv",
                "abricate_results/resfinder_summary.tsv",
                ReportFile,
                false,
            ),
            e(
                "vfdb_summary.tsv",
                Abricate,
                "abricate_results/vfdb_summary.tsv",
                "abricate_results/vfdb_summary.tsv",
                ReportFile,
                false,
            ),
            e(
                "argannot_summary.tsv",
                Abricate,
                "abricate_results/argannot_summary.tsv",
                "abricate_results/argannot_summary.tsv",
                ReportFile,
                false,
            ),
            e(
                "megares_summary.tsv",
                Abricate,
                "abricate_results/megares_summary.tsv",
                "abricate_results/megares_summary.tsv",
                ReportFile,
                false,
            ),
            e(
                "plasmidfinder_summary.tsv",
                Abricate,
                "abricate_results/plasmidfinder_summary.tsv",
                "abricate_results/plasmidfinder_summary.tsv",
                ReportFile,
                false,
            ),
        ])
    }

    pub fn lookup(&self, name: &str) -> Option<&ArtifactEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_critical(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|e| e.critical)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter()
    }

    pub fn for_module(&self, module: AnalysisModule) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter().filter(move |e| e.module == module)
    }

    pub fn critical(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter().filter(|e| e.critical)
    }

    /// Workspace directories to purge when restoring a module workspace,
    /// derived from the declared artifact sources (no second table).
    pub fn cleanup_dirs(&self, module: AnalysisModule) -> Vec<&'static str> {
        let mut dirs: Vec<&'static str> = self
            .for_module(module)
            .map(ArtifactEntry::workspace_top_dir)
            .collect();
        dirs.sort_unstable();
        dirs.dedup();
        dirs
    }
}
