//! Module descriptors and per-run state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use strum_macros::{Display as StrumDisplay, EnumIter};

/// One external analysis tool tracked by the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisModule {
    /// Assembly quality control.
    #[strum(to_string = "qc")]
    Qc,
    /// Multi-locus sequence typing, Pasteur scheme.
    #[strum(to_string = "mlst-pasteur")]
    MlstPasteur,
    /// Multi-locus sequence typing, Oxford scheme.
    #[strum(to_string = "mlst-oxford")]
    MlstOxford,
    /// K and OC surface-structure locus typing.
    #[strum(to_string = "kaptive")]
    Kaptive,
    /// Antimicrobial resistance gene detection.
    #[strum(to_string = "amr")]
    Amr,
    /// Resistance/virulence gene screening and plasmid profiling.
    #[strum(to_string = "abricate")]
    Abricate,
}

/// Static description of one module: where it stages its inputs, what to
/// invoke, and how. Defined once per module kind and never mutated.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub module: AnalysisModule,
    /// Human-facing banner title.
    pub title: &'static str,
    /// Directory where inputs are staged and the tool runs.
    pub workspace: PathBuf,
    /// The module's executable script, existence-checked before invocation.
    pub script: PathBuf,
    /// Argument template. A `{pattern}` token is replaced by the derived
    /// file pattern; without the token, the pattern is passed first.
    pub args: Vec<String>,
    /// Extension of stray report files to purge from the workspace root.
    pub report_ext: &'static str,
    /// Scratch directories some tools leave behind at the workspace root.
    pub scratch_dirs: Vec<&'static str>,
}

impl ModuleDescriptor {
    /// Build the full invocation argument list for a derived file pattern.
    pub fn invocation_args(&self, pattern: &FilePattern) -> Vec<String> {
        if self.args.iter().any(|a| a == "{pattern}") {
            self.args
                .iter()
                .map(|a| {
                    if a == "{pattern}" {
                        pattern.to_string()
                    } else {
                        a.clone()
                    }
                })
                .collect()
        } else {
            let mut args = vec![pattern.to_string()];
            args.extend(self.args.iter().cloned());
            args
        }
    }
}

/// The input file pattern handed to a module's executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePattern {
    /// All staged inputs share one extension: `*.<ext>`.
    Extension(String),
    /// Mixed extensions: an unrestricted wildcard.
    Any,
}

impl FilePattern {
    /// Derive the pattern from the actually staged file set. Heterogeneous
    /// extension sets (or files without an extension) yield the wildcard.
    pub fn from_staged<P: AsRef<Path>>(files: &[P]) -> FilePattern {
        let mut exts = BTreeSet::new();
        for file in files {
            match file.as_ref().extension() {
                Some(ext) => {
                    exts.insert(ext.to_string_lossy().to_lowercase());
                }
                None => return FilePattern::Any,
            }
        }
        if exts.len() == 1 {
            FilePattern::Extension(exts.into_iter().next().unwrap())
        } else {
            FilePattern::Any
        }
    }
}

impl Display for FilePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FilePattern::Extension(ext) => write!(f, "*.{ext}"),
            FilePattern::Any => write!(f, "*"),
        }
    }
}

/// Classified outcome of one module invocation. Soft failures are values,
/// never errors thrown past the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Zero exit status.
    Success,
    /// Nonzero exit status; artifacts may still be usable.
    Degraded { exit_code: i32 },
    /// The executable/script does not exist; no invocation was attempted.
    MissingTool,
    /// Staging or process spawn failed.
    Exception { detail: String },
}

impl RunOutcome {
    /// Hard module failure: nothing to harvest.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, RunOutcome::MissingTool | RunOutcome::Exception { .. })
    }

    /// A run worth harvesting, even if degraded.
    pub fn harvestable(&self) -> bool {
        !self.is_hard_failure()
    }
}

/// One execution instance of a module: created at invocation start,
/// finalized when the external process returns or the attempt faults.
#[derive(Debug, Clone)]
pub struct ModuleRun {
    pub module: AnalysisModule,
    /// Input file set, ordered and deduplicated by resolved path.
    pub inputs: Vec<PathBuf>,
    /// Pattern derived from the staged inputs.
    pub pattern: FilePattern,
    pub outcome: RunOutcome,
    /// Captured stdout/stderr, truncated.
    pub diagnostics: String,
    /// Stderr lines mentioning an error, first five.
    pub flagged: Vec<String>,
}

/// Scan diagnostic text for lines that look like tool errors; the first
/// five matches are surfaced as warnings.
pub fn flag_diagnostic_lines(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            lower.contains("error") || lower.contains("failed")
        })
        .take(5)
        .map(str::to_string)
        .collect()
}

/// Terminal state of one genome's run within a module batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenomeStatus {
    Success,
    Failed { reason: String },
}

impl GenomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, GenomeStatus::Success)
    }
}
