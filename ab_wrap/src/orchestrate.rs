//! Sequential pipeline orchestration: run each configured module through
//! the workspace adapter, harvest its artifacts, then gate and run the
//! final summary stage.

use crate::harvest::{harvest, HarvestManifest};
use crate::report::write_batch_reports;
use crate::stage::WorkspaceAdapter;
use crate::utils::find_assemblies;
use ab_types::artifact::ArtifactRegistry;
use ab_types::mlst::MlstScheme;
use ab_types::{AnalysisModule, ModuleDescriptor, RunOutcome};
use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{info, warn};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Which MLST scheme runs are part of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemeChoice {
    Pasteur,
    Oxford,
    #[default]
    Both,
}

impl SchemeChoice {
    pub fn includes(&self, scheme: MlstScheme) -> bool {
        match self {
            SchemeChoice::Both => true,
            SchemeChoice::Pasteur => scheme == MlstScheme::Pasteur,
            SchemeChoice::Oxford => scheme == MlstScheme::Oxford,
        }
    }
}

/// Everything the orchestrator needs to run one batch.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Input selector: a file, a directory, or a glob pattern.
    pub input: String,
    pub output_dir: PathBuf,
    /// Install base holding the `modules/` tree.
    pub modules_dir: PathBuf,
    /// Accepted for tools that take a thread count; module execution
    /// itself stays strictly sequential.
    pub threads: usize,
    pub mlst_scheme: SchemeChoice,
    pub skip_qc: bool,
    pub skip_mlst: bool,
    pub skip_kaptive: bool,
    pub skip_amr: bool,
    pub skip_abricate: bool,
    pub skip_summary: bool,
}

impl PipelineOptions {
    pub fn new(input: &str, output_dir: &Path) -> PipelineOptions {
        PipelineOptions {
            input: input.to_string(),
            output_dir: output_dir.to_path_buf(),
            modules_dir: PathBuf::from("modules"),
            threads: 2,
            mlst_scheme: SchemeChoice::Both,
            skip_qc: false,
            skip_mlst: false,
            skip_kaptive: false,
            skip_amr: false,
            skip_abricate: false,
            skip_summary: false,
        }
    }
}

/// The declared module list in execution order.
pub fn default_modules(modules_dir: &Path) -> Vec<ModuleDescriptor> {
    let simple = |module, title, dir: &str, script: &str| {
        let workspace = modules_dir.join(dir);
        ModuleDescriptor {
            module,
            title,
            script: workspace.join(script),
            workspace,
            args: vec![],
            report_ext: "tsv",
            scratch_dirs: vec![],
        }
    };
    vec![
        simple(AnalysisModule::Qc, "Assembly quality control", "qc_module", "fasta_qc"),
        mlst_descriptor(modules_dir, MlstScheme::Pasteur),
        mlst_descriptor(modules_dir, MlstScheme::Oxford),
        simple(AnalysisModule::Kaptive, "K/OC locus typing", "k_o_module", "ab_kaptive"),
        simple(AnalysisModule::Amr, "AMR gene detection", "amr_module", "amrfinder_batch"),
        simple(
            AnalysisModule::Abricate,
            "Resistance/virulence screening",
            "abricate_module",
            "abricate_batch",
        ),
    ]
}

fn mlst_descriptor(modules_dir: &Path, scheme: MlstScheme) -> ModuleDescriptor {
    let workspace = modules_dir.join("mlst_module");
    let module = match scheme {
        MlstScheme::Pasteur => AnalysisModule::MlstPasteur,
        MlstScheme::Oxford => AnalysisModule::MlstOxford,
    };
    let title = match scheme {
        MlstScheme::Pasteur => "MLST (Pasteur scheme)",
        MlstScheme::Oxford => "MLST (Oxford scheme)",
    };
    ModuleDescriptor {
        module,
        title,
        script: workspace.join("mlst_batch"),
        workspace,
        args: [
            "-i",
            "{pattern}",
            "-o",
            scheme.output_subdir(),
            "-db",
            "db",
            "-sc",
            "bin",
            "--batch",
            "-s",
            &scheme.to_string(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        report_ext: "tsv",
        // The MLST tool also drops these at the workspace root.
        scratch_dirs: vec!["PASTEUR_MLST", "OXFORD_MLST", "results"],
    }
}

/// Terminal state of one module within the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Succeeded,
    /// Nonzero exit; whatever artifacts appeared were still harvested.
    Degraded { exit_code: i32 },
    Failed { reason: String },
    Skipped,
}

impl ModuleStatus {
    fn from_outcome(outcome: &RunOutcome) -> ModuleStatus {
        match outcome {
            RunOutcome::Success => ModuleStatus::Succeeded,
            RunOutcome::Degraded { exit_code } => ModuleStatus::Degraded {
                exit_code: *exit_code,
            },
            RunOutcome::MissingTool => ModuleStatus::Failed {
                reason: "executable not found".to_string(),
            },
            RunOutcome::Exception { detail } => ModuleStatus::Failed {
                reason: detail.clone(),
            },
        }
    }
}

impl Display for ModuleStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Succeeded => write!(f, "succeeded"),
            ModuleStatus::Degraded { exit_code } => write!(f, "degraded (exit {exit_code})"),
            ModuleStatus::Failed { reason } => write!(f, "failed: {reason}"),
            ModuleStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// How the summary stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Done,
    SkippedByUser,
    /// The gate failed: these critical artifacts never materialized. The
    /// batch still completes in a degraded state.
    SkippedMissingCritical { missing: Vec<&'static str> },
}

/// Result of one whole batch, returned to the CLI for the terminal report.
#[derive(Debug)]
pub struct BatchReport {
    pub modules: Vec<(AnalysisModule, ModuleStatus)>,
    pub harvests: Vec<HarvestManifest>,
    pub summary: SummaryOutcome,
}

/// Registry-driven inventory of the output tree, taken after all modules
/// have run.
#[derive(Debug, Clone)]
pub struct AggregatedEntry {
    pub name: &'static str,
    pub critical: bool,
    pub path: PathBuf,
    pub found: bool,
}

#[derive(Debug, Clone)]
pub struct AggregatedReport {
    pub entries: Vec<AggregatedEntry>,
}

impl AggregatedReport {
    /// Check every declared artifact destination under the output root.
    pub fn collect(registry: &ArtifactRegistry, output_root: &Path) -> AggregatedReport {
        AggregatedReport {
            entries: registry
                .entries()
                .map(|entry| {
                    let path = entry.dest_in(output_root);
                    AggregatedEntry {
                        name: entry.name,
                        critical: entry.critical,
                        found: path.exists(),
                        path,
                    }
                })
                .collect(),
        }
    }

    pub fn missing_critical(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.critical && !e.found)
            .map(|e| e.name)
            .collect()
    }

    /// The summary gate: all critical artifacts present.
    pub fn ready(&self) -> bool {
        self.missing_critical().is_empty()
    }
}

/// Sequential module runner over an immutable registry and module list.
pub struct Pipeline {
    options: PipelineOptions,
    registry: ArtifactRegistry,
    modules: Vec<ModuleDescriptor>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Pipeline {
        let modules = default_modules(&options.modules_dir);
        Pipeline {
            registry: ArtifactRegistry::baumannii_layout(),
            options,
            modules,
        }
    }

    /// Run with an explicit registry and module list.
    pub fn with_modules(
        options: PipelineOptions,
        registry: ArtifactRegistry,
        modules: Vec<ModuleDescriptor>,
    ) -> Pipeline {
        Pipeline {
            options,
            registry,
            modules,
        }
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn skipped(&self, module: AnalysisModule) -> bool {
        let options = &self.options;
        match module {
            AnalysisModule::Qc => options.skip_qc,
            AnalysisModule::MlstPasteur => {
                options.skip_mlst || !options.mlst_scheme.includes(MlstScheme::Pasteur)
            }
            AnalysisModule::MlstOxford => {
                options.skip_mlst || !options.mlst_scheme.includes(MlstScheme::Oxford)
            }
            AnalysisModule::Kaptive => options.skip_kaptive,
            AnalysisModule::Amr => options.skip_amr,
            AnalysisModule::Abricate => options.skip_abricate,
        }
    }

    /// Run the whole batch. Module failures are recorded per module; only
    /// setup-level faults (unreadable inputs, uncreatable output root)
    /// return an error.
    pub fn run(&self) -> Result<BatchReport> {
        let inputs = find_assemblies(&self.options.input)?;
        std::fs::create_dir_all(&self.options.output_dir)
            .with_context(|| self.options.output_dir.display().to_string())?;
        info!("analyzing {} assemblies", inputs.len());

        let mut modules = Vec::new();
        let mut harvests = Vec::new();
        for descriptor in &self.modules {
            if self.skipped(descriptor.module) {
                info!("{}: skipped", descriptor.module);
                modules.push((descriptor.module, ModuleStatus::Skipped));
                continue;
            }
            info!("running {} ({})", descriptor.title, descriptor.module);
            let staged = WorkspaceAdapter::new(descriptor, &self.registry).run(&inputs);
            for line in &staged.run.flagged {
                warn!("{}: {line}", descriptor.module);
            }
            if staged.run.outcome.harvestable() {
                harvests.push(harvest(
                    &self.registry,
                    descriptor.module,
                    &descriptor.workspace,
                    &self.options.output_dir,
                )?);
            }
            modules.push((descriptor.module, ModuleStatus::from_outcome(&staged.run.outcome)));
        }

        let summary = self.summary_stage(&modules)?;
        Ok(BatchReport {
            modules,
            harvests,
            summary,
        })
    }

    /// Gate on the critical artifacts, then write the batch reports.
    pub fn summary_stage(
        &self,
        modules: &[(AnalysisModule, ModuleStatus)],
    ) -> Result<SummaryOutcome> {
        if self.options.skip_summary {
            return Ok(SummaryOutcome::SkippedByUser);
        }
        let inventory = AggregatedReport::collect(&self.registry, &self.options.output_dir);
        if !inventory.ready() {
            let missing = inventory.missing_critical();
            warn!("summary skipped, missing critical artifacts: {}", missing.join(", "));
            return Ok(SummaryOutcome::SkippedMissingCritical { missing });
        }
        write_batch_reports(&self.options.output_dir, modules)?;
        Ok(SummaryOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_input(dir: &Path) -> String {
        let path = dir.join("a.fna");
        std::fs::write(&path, b">seq\nACGT\n").unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn missing_tools_degrade_the_batch_and_gate_the_summary() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut options = PipelineOptions::new(&write_input(dir.path()), &out);
        options.modules_dir = dir.path().join("modules");

        let report = Pipeline::new(options).run().unwrap();
        assert_eq!(report.modules.len(), 6);
        assert!(report
            .modules
            .iter()
            .all(|(_, s)| matches!(s, ModuleStatus::Failed { .. })));
        assert!(report.harvests.is_empty());
        assert_eq!(
            report.summary,
            SummaryOutcome::SkippedMissingCritical {
                missing: vec![
                    "pasteur_mlst_summary.tsv",
                    "oxford_mlst_summary.tsv",
                    "Kaptive_summary.tsv",
                    "amrfinder_summary.tsv",
                    "card_summary.tsv",
                ]
            }
        );
    }

    #[test]
    fn skip_flags_suppress_modules_and_summary() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut options = PipelineOptions::new(&write_input(dir.path()), &out);
        options.modules_dir = dir.path().join("modules");
        options.skip_qc = true;
        options.skip_mlst = true;
        options.skip_kaptive = true;
        options.skip_amr = true;
        options.skip_abricate = true;
        options.skip_summary = true;

        let report = Pipeline::new(options).run().unwrap();
        assert!(report
            .modules
            .iter()
            .all(|(_, s)| *s == ModuleStatus::Skipped));
        assert_eq!(report.summary, SummaryOutcome::SkippedByUser);
    }

    #[test]
    fn scheme_choice_selects_the_mlst_runs() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut options = PipelineOptions::new("unused", &out);
        options.mlst_scheme = SchemeChoice::Pasteur;
        let pipeline = Pipeline::new(options);
        assert!(!pipeline.skipped(AnalysisModule::MlstPasteur));
        assert!(pipeline.skipped(AnalysisModule::MlstOxford));
        assert!(SchemeChoice::Both.includes(MlstScheme::Oxford));
    }

    #[test]
    fn declared_module_order_is_fixed() {
        use AnalysisModule::{Abricate, Amr, Kaptive, MlstOxford, MlstPasteur, Qc};
        let modules = default_modules(Path::new("/base/modules"));
        let order: Vec<AnalysisModule> = modules.iter().map(|d| d.module).collect();
        assert_eq!(order, [Qc, MlstPasteur, MlstOxford, Kaptive, Amr, Abricate]);
        assert_eq!(
            modules[1].workspace,
            Path::new("/base/modules/mlst_module")
        );
        assert!(modules[1].args.contains(&"pasteur".to_string()));
        assert!(modules[2].args.contains(&"mlst_oxford_results".to_string()));
        assert_eq!(
            modules[1].scratch_dirs,
            ["PASTEUR_MLST", "OXFORD_MLST", "results"]
        );
    }

    #[test]
    fn summary_stage_runs_once_all_criticals_are_present() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(out.join("kaptive_results")).unwrap();
        std::fs::write(
            out.join("kaptive_results/Kaptive_summary.tsv"),
            "Genome\tBest match locus\tBest match type\ng1\tKL3\tK3\ng1\tOCL1\tOC1\n",
        )
        .unwrap();
        std::fs::write(out.join("pasteur_mlst_summary.tsv"), "Genome\tST\ng1\t2\n").unwrap();
        std::fs::write(out.join("oxford_mlst_summary.tsv"), "Genome\tST\ng1\t195\n").unwrap();
        std::fs::create_dir_all(out.join("amrfinder_results")).unwrap();
        std::fs::write(out.join("amrfinder_results/amrfinder_summary.tsv"), "Genome\n").unwrap();
        std::fs::create_dir_all(out.join("abricate_results")).unwrap();
        std::fs::write(out.join("abricate_results/card_summary.tsv"), "Genome\n").unwrap();

        let pipeline = Pipeline::new(PipelineOptions::new("unused", &out));
        let outcome = pipeline
            .summary_stage(&[(AnalysisModule::Kaptive, ModuleStatus::Succeeded)])
            .unwrap();
        assert_eq!(outcome, SummaryOutcome::Done);
        let reports = out.join(crate::report::SUMMARY_DIR);
        assert!(reports.join("batch_summary.json").exists());
        assert!(reports.join("batch_summary_full.tsv").exists());
        let text = std::fs::read_to_string(reports.join("batch_summary_report.txt")).unwrap();
        assert!(text.contains("Genomes with both: 1"));
        assert!(text.contains("  kaptive: succeeded"));
        assert!(text.contains("  g1: ST 2"));
        assert!(text.contains("  g1: ST 195"));
    }

    #[test]
    fn aggregated_report_inventories_the_output_tree() {
        let dir = TempDir::new().unwrap();
        let registry = ArtifactRegistry::baumannii_layout();
        std::fs::write(dir.path().join("pasteur_mlst_summary.tsv"), "Genome\tST\n").unwrap();

        let inventory = AggregatedReport::collect(&registry, dir.path());
        assert!(!inventory.ready());
        let missing = inventory.missing_critical();
        assert!(!missing.contains(&"pasteur_mlst_summary.tsv"));
        assert!(missing.contains(&"Kaptive_summary.tsv"));
    }
}
