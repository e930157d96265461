use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use swmr_ringbuf_tools::{
    init_tracing,
    verify::{verify, MAX_REPORTED},
};

/// Checks sample files written by swmr-reader against the generated signal.
#[derive(Parser)]
#[command(name = "swmr-verify", version)]
struct Cli {
    /// Samples went through swmr-transformer.
    #[arg(long)]
    transform: bool,

    /// Sample files, checked in name order.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let report = verify(&cli.files, cli.transform)?;
    for mismatch in &report.mismatches {
        eprintln!(
            "mismatch at data point {} (file {}): {} instead of {}",
            mismatch.index,
            mismatch.file.display(),
            mismatch.found,
            mismatch.expected
        );
    }
    if report.mismatch_count > MAX_REPORTED as u64 {
        eprintln!("more mismatches not printed ...");
    }

    if report.is_ok() {
        println!("verification successful: {} points", report.points);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} mismatches found in {} points", report.mismatch_count, report.points);
        Ok(ExitCode::FAILURE)
    }
}
