//! Module workspace staging and invocation.
//!
//! Each module runs inside its own workspace directory: inputs are copied
//! in, the module executable runs with the workspace as its working
//! directory, artifacts are harvested, and the workspace is restored to
//! its pre-run state. Restoration is drop-based so it also happens when
//! harvesting errors or panics.

use crate::utils::genome_name;
use ab_types::artifact::ArtifactRegistry;
use ab_types::module::{flag_diagnostic_lines, ModuleDescriptor};
use ab_types::{FilePattern, ModuleRun, RunOutcome};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured stdout/stderr is truncated to this many bytes.
pub const DIAGNOSTIC_LIMIT: usize = 4096;

/// Stages inputs into a module workspace and invokes the module.
///
/// Every failure mode of the module itself is reported as a
/// [`RunOutcome`] value; `run` does not return errors.
pub struct WorkspaceAdapter<'a> {
    descriptor: &'a ModuleDescriptor,
    registry: &'a ArtifactRegistry,
}

impl<'a> WorkspaceAdapter<'a> {
    pub fn new(descriptor: &'a ModuleDescriptor, registry: &'a ArtifactRegistry) -> Self {
        WorkspaceAdapter {
            descriptor,
            registry,
        }
    }

    /// Stage `inputs`, invoke the module, and classify the outcome. The
    /// returned [`StagedRun`] keeps the workspace intact (artifacts in
    /// place) until it is dropped.
    pub fn run(&self, inputs: &[PathBuf]) -> StagedRun {
        let descriptor = self.descriptor;
        let pattern = FilePattern::from_staged(inputs);
        let mut guard = WorkspaceGuard {
            workspace: descriptor.workspace.clone(),
            staged: Vec::new(),
            purge_dirs: self.purge_dirs(),
            report_ext: descriptor.report_ext.to_string(),
        };

        // Existence-check the executable before staging. Restoration still
        // runs, purging leftovers from a crashed prior run.
        if !descriptor.script.is_file() {
            debug!("{}: {} not found", descriptor.module, descriptor.script.display());
            return StagedRun {
                run: self.finish(inputs, pattern, RunOutcome::MissingTool, String::new()),
                guard,
            };
        }
        for input in inputs {
            let dest = descriptor.workspace.join(match input.file_name() {
                Some(name) => PathBuf::from(name),
                None => PathBuf::from(genome_name(input)),
            });
            if let Err(err) = std::fs::copy(input, &dest) {
                let detail = format!("error staging {}: {err}", input.display());
                return StagedRun {
                    run: self.finish(inputs, pattern, RunOutcome::Exception { detail }, String::new()),
                    guard,
                };
            }
            guard.staged.push(dest);
        }

        let script = match descriptor.script.canonicalize() {
            Ok(script) => script,
            Err(err) => {
                let detail = format!("error resolving {}: {err}", descriptor.script.display());
                return StagedRun {
                    run: self.finish(inputs, pattern, RunOutcome::Exception { detail }, String::new()),
                    guard,
                };
            }
        };
        let output = Command::new(script)
            .args(descriptor.invocation_args(&pattern))
            .current_dir(&descriptor.workspace)
            .output();
        let (outcome, diagnostics, stderr) = match output {
            Ok(output) => {
                let outcome = if output.status.success() {
                    RunOutcome::Success
                } else {
                    RunOutcome::Degraded {
                        exit_code: output.status.code().unwrap_or(-1),
                    }
                };
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
                diagnostics.push_str(&stderr);
                (outcome, truncate_diagnostics(diagnostics), stderr)
            }
            Err(err) => (
                RunOutcome::Exception {
                    detail: format!("error invoking {}: {err}", descriptor.script.display()),
                },
                String::new(),
                String::new(),
            ),
        };

        let mut run = self.finish(inputs, pattern, outcome, diagnostics);
        run.flagged = flag_diagnostic_lines(&stderr);
        StagedRun { run, guard }
    }

    fn finish(
        &self,
        inputs: &[PathBuf],
        pattern: FilePattern,
        outcome: RunOutcome,
        diagnostics: String,
    ) -> ModuleRun {
        ModuleRun {
            module: self.descriptor.module,
            inputs: inputs.to_vec(),
            pattern,
            outcome,
            diagnostics,
            flagged: Vec::new(),
        }
    }

    /// Workspace-root directories to purge on restoration: the declared
    /// artifact directories for this module plus the tool's scratch dirs.
    fn purge_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .registry
            .cleanup_dirs(self.descriptor.module)
            .into_iter()
            .map(str::to_string)
            .collect();
        dirs.extend(self.descriptor.scratch_dirs.iter().map(|d| d.to_string()));
        dirs.sort_unstable();
        dirs.dedup();
        dirs
    }
}

/// One completed module invocation with its workspace still intact.
/// Dropping it restores the workspace.
pub struct StagedRun {
    pub run: ModuleRun,
    #[allow(dead_code)]
    guard: WorkspaceGuard,
}

struct WorkspaceGuard {
    workspace: PathBuf,
    staged: Vec<PathBuf>,
    purge_dirs: Vec<String>,
    report_ext: String,
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        restore_workspace(&self.workspace, &self.staged, &self.purge_dirs, &self.report_ext);
    }
}

/// Restore a module workspace: remove the staged inputs, the declared
/// artifact and scratch directories, and stray report files at the
/// workspace root. Failures are logged, never raised.
fn restore_workspace(workspace: &Path, staged: &[PathBuf], purge_dirs: &[String], report_ext: &str) {
    for file in staged {
        if let Err(err) = std::fs::remove_file(file) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("error removing staged {}: {err}", file.display());
            }
        }
    }
    for dir in purge_dirs {
        let path = workspace.join(dir);
        // A tool fault can leave a file where a directory belongs.
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else if path.is_file() || path.is_symlink() {
            std::fs::remove_file(&path)
        } else {
            continue;
        };
        if let Err(err) = result {
            warn!("error removing {}: {err}", path.display());
        }
    }
    // Extension match rather than a glob pattern: the workspace path may
    // itself contain glob metacharacters.
    if let Ok(entries) = std::fs::read_dir(workspace) {
        for entry in entries.flatten() {
            let path = entry.path();
            let stray = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(report_ext));
            if stray {
                if let Err(err) = std::fs::remove_file(&path) {
                    warn!("error removing stray report {}: {err}", path.display());
                }
            }
        }
    }
}

fn truncate_diagnostics(mut text: String) -> String {
    if text.len() > DIAGNOSTIC_LIMIT {
        let mut end = DIAGNOSTIC_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_types::AnalysisModule;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn descriptor(workspace: &Path, script: &str) -> ModuleDescriptor {
        ModuleDescriptor {
            module: AnalysisModule::Kaptive,
            title: "K/OC locus typing",
            workspace: workspace.to_path_buf(),
            script: workspace.join(script),
            args: vec![],
            report_ext: "tsv",
            scratch_dirs: vec!["tmp_scratch"],
        }
    }

    fn input_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b">seq\nACGT\n").unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_stages_invokes_and_restores() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        // Stray report predating the run; restoration removes it too.
        std::fs::write(ws.join("leftover.tsv"), "old").unwrap();
        write_script(
            &ws.join("ab_kaptive"),
            "mkdir -p kaptive_results\ncp $1 kaptive_results/echoed 2>/dev/null\n\
             mkdir tmp_scratch\necho staged: \"$1\"\n",
        );
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");
        let adapter = WorkspaceAdapter::new(&descriptor, &registry);

        let staged = adapter.run(&inputs);
        assert_eq!(staged.run.outcome, RunOutcome::Success);
        assert_eq!(staged.run.pattern.to_string(), "*.fna");
        assert!(staged.run.diagnostics.contains("staged: *.fna"));
        // Workspace still intact for harvesting.
        assert!(ws.join("kaptive_results/echoed").exists());
        assert!(ws.join("a.fna").exists());

        drop(staged);
        assert!(!ws.join("a.fna").exists());
        assert!(!ws.join("kaptive_results").exists());
        assert!(!ws.join("tmp_scratch").exists());
        assert!(!ws.join("leftover.tsv").exists());
        assert!(ws.join("ab_kaptive").exists());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_degraded_and_still_harvestable() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        write_script(
            &ws.join("ab_kaptive"),
            "mkdir -p kaptive_results\ntouch kaptive_results/partial.tsv\n\
             echo 'ERROR: database not found' >&2\nexit 3\n",
        );
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");
        let staged = WorkspaceAdapter::new(&descriptor, &registry).run(&inputs);

        assert_eq!(staged.run.outcome, RunOutcome::Degraded { exit_code: 3 });
        assert!(staged.run.outcome.harvestable());
        assert_eq!(staged.run.flagged, ["ERROR: database not found"]);
        assert!(ws.join("kaptive_results/partial.tsv").exists());
    }

    #[test]
    fn missing_tool_fails_fast_but_still_restores() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        // Leftovers from a crashed prior run.
        std::fs::create_dir(ws.join("kaptive_results")).unwrap();
        std::fs::write(ws.join("kaptive_results/old.tsv"), "stale").unwrap();
        std::fs::write(ws.join("stray.tsv"), "stale").unwrap();
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "no_such_tool");
        let staged = WorkspaceAdapter::new(&descriptor, &registry).run(&inputs);

        assert_eq!(staged.run.outcome, RunOutcome::MissingTool);
        assert!(staged.run.outcome.is_hard_failure());
        assert!(!ws.join("a.fna").exists());
        drop(staged);
        assert!(!ws.join("kaptive_results").exists());
        assert!(!ws.join("stray.tsv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn stray_reports_are_removed_from_bracketed_install_paths() {
        let dir = TempDir::new().unwrap();
        // Glob metacharacters in the install path must not disable cleanup.
        let ws = dir.path().join("ws[1]");
        std::fs::create_dir(&ws).unwrap();
        std::fs::write(ws.join("leftover.tsv"), "old").unwrap();
        write_script(&ws.join("ab_kaptive"), "true\n");
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");

        drop(WorkspaceAdapter::new(&descriptor, &registry).run(&inputs));
        assert!(!ws.join("leftover.tsv").exists());
        assert!(ws.join("ab_kaptive").exists());
    }

    #[cfg(unix)]
    #[test]
    fn mixed_extensions_invoke_with_wildcard() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        write_script(&ws.join("ab_kaptive"), "echo got: \"$1\"\n");
        let inputs = vec![
            input_file(dir.path(), "a.fna"),
            input_file(dir.path(), "b.fasta"),
        ];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");
        let staged = WorkspaceAdapter::new(&descriptor, &registry).run(&inputs);
        assert_eq!(staged.run.pattern, FilePattern::Any);
        assert!(staged.run.diagnostics.contains("got: *"));
    }

    #[cfg(unix)]
    #[test]
    fn restoration_runs_even_when_the_harvest_step_panics() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        write_script(&ws.join("ab_kaptive"), "mkdir -p kaptive_results\n");
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");

        let result = std::panic::catch_unwind(|| {
            let _staged = WorkspaceAdapter::new(&descriptor, &registry).run(&inputs);
            panic!("harvest blew up");
        });
        assert!(result.is_err());
        assert!(!ws.join("a.fna").exists());
        assert!(!ws.join("kaptive_results").exists());
    }

    #[cfg(unix)]
    #[test]
    fn stray_file_under_a_declared_output_name_is_removed() {
        let dir = TempDir::new().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir(&ws).unwrap();
        // A file where the output directory belongs, left by a tool fault.
        std::fs::write(ws.join("kaptive_results"), "not a directory").unwrap();
        write_script(&ws.join("ab_kaptive"), "true\n");
        let inputs = vec![input_file(dir.path(), "a.fna")];
        let registry = ArtifactRegistry::baumannii_layout();
        let descriptor = descriptor(&ws, "ab_kaptive");

        drop(WorkspaceAdapter::new(&descriptor, &registry).run(&inputs));
        assert!(!ws.join("kaptive_results").exists());
    }

    #[test]
    fn long_diagnostics_are_truncated() {
        let text = "x".repeat(DIAGNOSTIC_LIMIT + 100);
        assert_eq!(truncate_diagnostics(text).len(), DIAGNOSTIC_LIMIT);
        assert_eq!(truncate_diagnostics("short".to_string()), "short");
    }
}
