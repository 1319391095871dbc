//! spindlestats: detect sleep spindles in every EDF recording of an archive
//! directory and append per-subject summary tables to one workbook.
//!
//! With no arguments it reads `Archive/` and `sleepScorer/` from the working
//! directory and writes `SpindleStats.xlsx`, `logFile.log` and
//! `errorLogFile.txt` next to them.
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};

use spindlestats::{run_batch, BatchConfig, ErrorLog, FileOutcome, SpindleConfig};

#[derive(Parser, Debug)]
#[command(name = "spindlestats", about = "Batch sleep-spindle statistics from EDF recordings")]
struct Args {
    /// Directory of EDF recordings.
    #[arg(long, default_value = "Archive")]
    archive: PathBuf,

    /// Directory of scoring spreadsheets (`<NAME>_ODS.ods`).
    #[arg(long, default_value = "sleepScorer")]
    scoring: PathBuf,

    /// Output workbook.
    #[arg(long, default_value = "SpindleStats.xlsx")]
    output: PathBuf,

    /// Error log, appended to across runs.
    #[arg(long, default_value = "errorLogFile.txt")]
    error_log: PathBuf,

    /// Process log, truncated at every run.
    #[arg(long, default_value = "logFile.log")]
    log_file: PathBuf,

    /// Downsample to this rate (Hz) before detection.
    #[arg(long)]
    resample: Option<f64>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .write_style(env_logger::WriteStyle::Never)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    log::info!("Spindle Density Log File (errors and warnings)");

    let cfg = BatchConfig {
        archive_dir: args.archive,
        scoring_dir: args.scoring,
        output: args.output,
        error_log: args.error_log,
        spindle: SpindleConfig {
            resample_sfreq: args.resample,
            ..SpindleConfig::default()
        },
        ..BatchConfig::default()
    };
    let errors = ErrorLog::new(&cfg.error_log);

    let report = run_batch(&cfg, &errors, |name| {
        println!("\n~~~~~~~~~~~~~~\n {name} \n~~~~~~~~~~~~~~\n");
    })?;

    for (name, outcome) in &report.files {
        match outcome {
            FileOutcome::Written { sheet, replaced, n_staged, n_unstaged } => {
                let note = if *replaced { " (replaced)" } else { "" };
                println!("{name} → sheet {sheet}{note}: {n_staged} staged / {n_unstaged} unstaged spindles");
            }
            FileOutcome::Failed(failure) => println!("{name} ✗ {failure}"),
            FileOutcome::Skipped => {}
        }
    }
    println!(
        "Done: {} written, {} failed, {} skipped → {}",
        report.n_written(),
        report.n_failed(),
        report.n_skipped(),
        cfg.output.display()
    );
    Ok(())
}
