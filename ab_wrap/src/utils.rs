//! Input discovery and small shared helpers.

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use std::path::{Path, PathBuf};

/// Assembly file extensions accepted as pipeline input.
pub const FASTA_EXTENSIONS: [&str; 4] = ["fna", "fasta", "fa", "fn"];

fn has_fasta_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| FASTA_EXTENSIONS.contains(&e.as_str()))
}

/// Resolve the `-i` argument into the ordered input file set. Accepts a
/// single file, a directory (scanned non-recursively for assembly
/// extensions), or a glob pattern. The result is sorted and deduplicated
/// by resolved path; an empty result is a setup error.
pub fn find_assemblies(input: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    let mut files: Vec<PathBuf> = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        std::fs::read_dir(path)
            .with_context(|| format!("error reading input directory {input}"))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_fasta_extension(p))
            .collect()
    } else {
        glob::glob(input)
            .with_context(|| format!("invalid input pattern {input}"))?
            .filter_map(|m| m.ok())
            .filter(|p| p.is_file())
            .collect()
    };
    files.sort();
    let files = dedupe_by_resolved(files);
    if files.is_empty() {
        bail!("no assembly files found for input {input}");
    }
    Ok(files)
}

/// Drop entries that resolve to the same file (symlinks, `./` aliases),
/// keeping the first occurrence.
pub fn dedupe_by_resolved(files: Vec<PathBuf>) -> Vec<PathBuf> {
    files
        .into_iter()
        .unique_by(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect()
}

/// Genome identifier of an assembly file: the file stem.
pub fn genome_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Recursively copy `src` into `dest`, replacing whatever is there.
pub fn copy_dir_replace(src: &Path, dest: &Path) -> Result<()> {
    if dest.is_dir() {
        std::fs::remove_dir_all(dest).with_context(|| dest.display().to_string())?;
    } else if dest.is_file() || dest.is_symlink() {
        std::fs::remove_file(dest).with_context(|| dest.display().to_string())?;
    }
    copy_dir(src, dest)
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).with_context(|| dest.display().to_string())?;
    for entry in std::fs::read_dir(src).with_context(|| src.display().to_string())? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| entry.path().display().to_string())?;
        }
    }
    Ok(())
}

/// Convert an io::error to a string and strip "(os error 4)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Print an error chain.
pub fn print_error_chain(err: &anyhow::Error) {
    let error_chain = err.chain().join("\n\tCaused by: ");
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        let io_err_str = io_error_to_string(io_err);
        match err.chain().len() {
            1 => println!("ERROR: {io_err_str}"),
            2 => println!("ERROR: {io_err_str}: {err}"),
            _ => println!("ERROR: {error_chain}"),
        };
    } else {
        println!("ERROR: {error_chain}");
    };
}
