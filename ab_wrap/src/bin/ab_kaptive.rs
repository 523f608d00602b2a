//! ab_kaptive
#![deny(missing_docs)]

use ab_aggr::{aggregate, narrative, write_delimited, write_structured};
use ab_types::locus::LocusRecord;
use ab_types::module::flag_diagnostic_lines;
use ab_types::tabular::TabularReport;
use ab_types::GenomeStatus;
use ab_wrap::utils::{find_assemblies, genome_name, print_error_chain};
use anyhow::{bail, Context, Result};
use clap::{self, Parser};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const CMD: &str = "ab_kaptive";

/// Type the K and OC surface-structure loci of A. baumannii assemblies
/// with kaptive and write the batch summary views.
#[derive(Parser, Debug)]
#[clap(name = CMD, version)]
struct AbKaptive {
    /// Input assemblies: a file, a directory, or a glob pattern
    input: String,

    /// Output directory
    #[clap(short = 'o', long = "output", default_value = "kaptive_results")]
    output: PathBuf,

    /// K-locus database name
    #[clap(long = "k-db", default_value = "ab_k")]
    k_db: String,

    /// OC-locus database name
    #[clap(long = "o-db", default_value = "ab_o")]
    o_db: String,

    /// kaptive executable to invoke
    #[clap(long, hide = true, default_value = "kaptive")]
    kaptive: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = AbKaptive::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &AbKaptive) -> Result<()> {
    let inputs = find_assemblies(&args.input)?;
    std::fs::create_dir_all(&args.output)
        .with_context(|| args.output.display().to_string())?;
    println!("{CMD}: typing {} assemblies", inputs.len());

    let mut genomes = Vec::new();
    for path in &inputs {
        let genome = genome_name(path);
        match type_genome(args, path, &genome) {
            Ok(records) => {
                println!("  {genome}: {} locus hits", records.len());
                genomes.push((genome, GenomeStatus::Success, records));
            }
            Err(err) => {
                let reason = format!("{err:#}");
                println!("  {genome}: failed ({reason})");
                genomes.push((genome, GenomeStatus::Failed { reason }, vec![]));
            }
        }
    }

    let summary = aggregate(&genomes);
    summary.verify()?;
    write_delimited(&summary, &args.output.join("Kaptive_summary.tsv"))?;
    write_structured(&summary, &args.output.join("Kaptive_summary.json"), CMD)?;
    let report_path = args.output.join("Kaptive_summary_report.txt");
    std::fs::write(&report_path, narrative(&summary, "K/OC locus typing summary"))
        .with_context(|| report_path.display().to_string())?;

    println!(
        "{} of {} genomes typed, {} with both K and OC loci",
        summary.successful_genomes, summary.total_genomes, summary.genomes_with_both
    );
    Ok(())
}

/// Run kaptive against both databases for one assembly, merge the two
/// reports, and parse the locus records.
fn type_genome(args: &AbKaptive, assembly: &Path, genome: &str) -> Result<Vec<LocusRecord>> {
    let k = invoke_kaptive(args, &args.k_db, assembly, &args.output.join(format!("{genome}_k.tsv")))?;
    let o = invoke_kaptive(args, &args.o_db, assembly, &args.output.join(format!("{genome}_o.tsv")))?;
    let merged = TabularReport::merge(k, o);
    merged.write_to(&args.output.join(format!("{genome}_combined.tsv")))?;
    Ok(LocusRecord::from_report(genome, &merged))
}

fn invoke_kaptive(
    args: &AbKaptive,
    db: &str,
    assembly: &Path,
    out_tsv: &Path,
) -> Result<TabularReport> {
    let output = Command::new(&args.kaptive)
        .args(["assembly", db])
        .arg(assembly)
        .arg("-o")
        .arg(out_tsv)
        .arg("--verbose")
        .output()
        .with_context(|| format!("error invoking {}", args.kaptive))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let flagged = flag_diagnostic_lines(&stderr);
        match flagged.first() {
            Some(line) => bail!(
                "kaptive {db} exited with status {}: {line}",
                output.status.code().unwrap_or(-1)
            ),
            None => bail!(
                "kaptive {db} exited with status {}",
                output.status.code().unwrap_or(-1)
            ),
        }
    }
    // A database with no hits may legitimately produce no table.
    TabularReport::read_or_empty(out_tsv)
}
