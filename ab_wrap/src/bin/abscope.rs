//! abscope
#![deny(missing_docs)]

use ab_wrap::orchestrate::{Pipeline, PipelineOptions, SchemeChoice, SummaryOutcome};
use ab_wrap::report::SUMMARY_DIR;
use ab_wrap::utils::print_error_chain;
use anyhow::Result;
use clap::{self, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

const CMD: &str = "abscope";

/// Type a batch of A. baumannii genome assemblies: QC, MLST, K/OC locus
/// typing, AMR detection, and gene screening, with a final batch summary.
#[derive(Parser, Debug)]
#[clap(name = CMD, version)]
struct Abscope {
    /// Input assemblies: a file, a directory, or a glob pattern
    #[clap(short = 'i', long = "input")]
    input: String,

    /// Output directory for harvested artifacts and reports
    #[clap(short = 'o', long = "output", default_value = "abscope_results")]
    output: PathBuf,

    /// Thread count passed to tools that accept one
    #[clap(short = 't', long = "threads", default_value_t = 2)]
    threads: usize,

    /// MLST scheme(s) to run
    #[clap(long = "mlst-scheme", value_enum, default_value = "both")]
    mlst_scheme: SchemeChoice,

    /// Skip assembly quality control
    #[clap(long)]
    skip_qc: bool,

    /// Skip both MLST runs
    #[clap(long)]
    skip_mlst: bool,

    /// Skip K/OC locus typing
    #[clap(long)]
    skip_kaptive: bool,

    /// Skip AMR gene detection
    #[clap(long)]
    skip_amr: bool,

    /// Skip resistance/virulence gene screening
    #[clap(long)]
    skip_abricate: bool,

    /// Skip the final batch summary stage
    #[clap(long)]
    skip_summary: bool,

    /// Install base holding the modules/ tree
    #[clap(long, hide = true, default_value = "modules")]
    modules_dir: PathBuf,
}

impl Abscope {
    fn into_options(self) -> PipelineOptions {
        let mut options = PipelineOptions::new(&self.input, &self.output);
        options.modules_dir = self.modules_dir;
        options.threads = self.threads;
        options.mlst_scheme = self.mlst_scheme;
        options.skip_qc = self.skip_qc;
        options.skip_mlst = self.skip_mlst;
        options.skip_kaptive = self.skip_kaptive;
        options.skip_amr = self.skip_amr;
        options.skip_abricate = self.skip_abricate;
        options.skip_summary = self.skip_summary;
        options
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Abscope::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Abscope) -> Result<()> {
    let output = args.output.clone();
    let pipeline = Pipeline::new(args.into_options());

    println!("{CMD} {}", env!("CARGO_PKG_VERSION"));
    println!("Planned modules:");
    for descriptor in pipeline.modules() {
        let note = if pipeline.skipped(descriptor.module) {
            " (skipped)"
        } else {
            ""
        };
        println!("  {}{note}", descriptor.title);
    }

    let report = pipeline.run()?;

    println!();
    println!("Module results:");
    for (module, status) in &report.modules {
        println!("  {module}: {status}");
    }
    match &report.summary {
        SummaryOutcome::Done => {
            println!("Batch summary written to {}", output.join(SUMMARY_DIR).display());
        }
        SummaryOutcome::SkippedByUser => println!("Batch summary skipped (--skip-summary)"),
        SummaryOutcome::SkippedMissingCritical { missing } => {
            println!("Batch summary skipped, missing critical artifacts:");
            for name in missing {
                println!("  {name}");
            }
        }
    }
    Ok(())
}
