//! Artifact harvesting: move declared module outputs from the workspace
//! into the canonical output tree.

use crate::utils::copy_dir_replace;
use ab_types::artifact::{ArtifactKind, ArtifactRegistry};
use ab_types::AnalysisModule;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Harvest result for one declared artifact.
#[derive(Debug, Clone)]
pub struct HarvestRecord {
    pub name: &'static str,
    pub found: bool,
    pub dest: PathBuf,
}

/// What a module's harvest pass found, one record per declared artifact.
#[derive(Debug, Clone)]
pub struct HarvestManifest {
    pub module: AnalysisModule,
    pub records: Vec<HarvestRecord>,
}

impl HarvestManifest {
    pub fn found(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name && r.found)
    }

    pub fn missing(&self) -> impl Iterator<Item = &HarvestRecord> {
        self.records.iter().filter(|r| !r.found)
    }
}

/// Copy every artifact the registry declares for `module` out of the
/// workspace. A missing or uncopyable artifact is recorded and logged,
/// never short-circuits the rest of the pass; only an uncreatable output
/// root is an error.
pub fn harvest(
    registry: &ArtifactRegistry,
    module: AnalysisModule,
    workspace: &Path,
    output_root: &Path,
) -> Result<HarvestManifest> {
    std::fs::create_dir_all(output_root).with_context(|| output_root.display().to_string())?;
    let mut records = Vec::new();
    for entry in registry.for_module(module) {
        let source = entry.source_in(workspace);
        let dest = entry.dest_in(output_root);
        let found = if !source.exists() {
            debug!("{module}: {} not produced", entry.name);
            false
        } else {
            let copied = match entry.kind {
                ArtifactKind::Directory => copy_dir_replace(&source, &dest),
                ArtifactKind::ReportFile => copy_report(&source, &dest),
            };
            match copied {
                Ok(()) => true,
                Err(err) => {
                    warn!("{module}: error harvesting {}: {err:#}", entry.name);
                    false
                }
            }
        };
        records.push(HarvestRecord {
            name: entry.name,
            found,
            dest,
        });
    }
    Ok(HarvestManifest { module, records })
}

fn copy_report(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).with_context(|| parent.display().to_string())?;
    }
    std::fs::copy(source, dest).with_context(|| source.display().to_string())?;
    Ok(())
}
