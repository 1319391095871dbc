//! Batch driver: one pass over the archive, one outcome per file.
//!
//! ```text
//! Start ─► Loaded ─► Aligned ─► Detected ─► Written
//!   │         └──────────┴──────────┴──────────┴──► Failed  (error log line, next file)
//!   └─► Skipped  (wrong suffix)
//! ```
//!
//! Failures are contained per file. Only an unusable workbook, an unreadable
//! archive directory or an unwritable error log stop the run.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::BatchConfig;
use crate::edf::read_edf;
use crate::hypno::{read_hypnogram, upsample_to_data};
use crate::summarize_subject;
use crate::workbook::{ensure_workbook, write_subject_tables};

/// Where in the per-file pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    LoadSignal,
    LoadLabels,
    Align,
    Detect,
    Write,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStep::LoadSignal => "load signal",
            PipelineStep::LoadLabels => "load labels",
            PipelineStep::Align => "align",
            PipelineStep::Detect => "detect",
            PipelineStep::Write => "write",
        })
    }
}

/// A contained per-file failure.
#[derive(Debug, Error)]
#[error("{step}: {error:#}")]
pub struct FileFailure {
    pub step: PipelineStep,
    pub error: anyhow::Error,
}

/// Tag a step's error with the step it came from.
trait AtStep<T> {
    fn at(self, step: PipelineStep) -> Result<T, FileFailure>;
}

impl<T, E: Into<anyhow::Error>> AtStep<T> for Result<T, E> {
    fn at(self, step: PipelineStep) -> Result<T, FileFailure> {
        self.map_err(|e| FileFailure { step, error: e.into() })
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Skipped,
    Written {
        sheet: String,
        replaced: bool,
        /// Events found by the staged and the unstaged pass.
        n_staged: usize,
        n_unstaged: usize,
    },
    Failed(FileFailure),
}

/// Ordered outcomes of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub files: Vec<(String, FileOutcome)>,
}

impl RunReport {
    pub fn n_written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { .. }))
    }

    pub fn n_skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped))
    }

    pub fn n_failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// Outcome recorded for `name`, if it was listed.
    pub fn outcome(&self, name: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Append-only plain-text error log, one `"<file>: <message>"` line per
/// failure. The file is opened and closed for every entry.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, file_name: &str, message: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open error log {}", self.path.display()))?;
        writeln!(f, "{file_name}: {message}")
            .with_context(|| format!("write error log {}", self.path.display()))?;
        Ok(())
    }
}

/// Entries of `dir`, sorted by name.
pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let mut names = std::fs::read_dir(dir)
        .with_context(|| format!("list archive {}", dir.display()))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("list archive {}", dir.display()))?;
    names.sort();
    Ok(names)
}

/// Whether `name` carries the recording suffix (case-sensitive).
#[inline]
pub fn is_recording(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix)
}

/// Run the whole per-file pipeline for one recording.
pub fn process_file(cfg: &BatchConfig, file_name: &str) -> Result<FileOutcome, FileFailure> {
    let scoring = cfg.scoring_path_for(file_name);
    log::info!("loading files: {file_name}\t{}", scoring.display());

    let rec = read_edf(cfg.recording_path(file_name)).at(PipelineStep::LoadSignal)?;
    log::info!(
        "loaded EEG data: {} channels, sampling freq = {} Hz, {:.1} s",
        rec.n_chan(),
        rec.sfreq,
        rec.duration_secs()
    );

    let hypno = read_hypnogram(&scoring, cfg.scoring_header_rows).at(PipelineStep::LoadLabels)?;

    let dense = upsample_to_data(&hypno.codes(), cfg.sf_hypno(), rec.sfreq, rec.n_times())
        .at(PipelineStep::Align)?;

    let tables = summarize_subject(&rec, &dense, &cfg.include, &cfg.spindle).at(PipelineStep::Detect)?;

    let sheet = cfg.sheet_name_for(file_name);
    let report = write_subject_tables(&cfg.output, &sheet, &tables.as_refs()).at(PipelineStep::Write)?;

    Ok(FileOutcome::Written {
        sheet,
        replaced: report.replaced,
        n_staged: tables.n_staged,
        n_unstaged: tables.n_unstaged,
    })
}

/// Process every recording in the archive.
///
/// `on_file` is called with every listed name, recording or not, before it
/// is looked at.
pub fn run_batch(cfg: &BatchConfig, errors: &ErrorLog, mut on_file: impl FnMut(&str)) -> Result<RunReport> {
    ensure_workbook(&cfg.output)?;
    let names = discover(&cfg.archive_dir)?;

    let mut report = RunReport::default();
    for name in names {
        on_file(&name);
        log::info!("~~~~~~~~ {name} ~~~~~~~~");
        if !is_recording(&name, &cfg.recording_suffix) {
            log::info!("skipping non {} file: {name}", cfg.recording_suffix);
            report.files.push((name, FileOutcome::Skipped));
            continue;
        }

        let outcome = match process_file(cfg, &name) {
            Ok(outcome) => outcome,
            Err(failure) => {
                log::error!("{name}: {failure}");
                errors.append(&name, &failure.to_string())?;
                FileOutcome::Failed(failure)
            }
        };
        report.files.push((name, outcome));
    }

    log::info!(
        "run finished: {} written, {} failed, {} skipped",
        report.n_written(),
        report.n_failed(),
        report.n_skipped()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_case_sensitive() {
        assert!(is_recording("a.edf", ".edf"));
        assert!(!is_recording("a.EDF", ".edf"));
        assert!(!is_recording("a.edf.bak", ".edf"));
    }

    #[test]
    fn discover_sorts_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.edf", "a.edf", "C.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(discover(dir.path()).unwrap(), vec!["C.txt", "a.edf", "b.edf"]);
    }

    #[test]
    fn missing_archive_is_error() {
        assert!(discover("/no/such/archive").is_err());
    }

    #[test]
    fn error_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("err.txt"));
        log.append("a.edf", "first").unwrap();
        log.append("b.edf", "second").unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text, "a.edf: first\nb.edf: second\n");
    }

    #[test]
    fn failure_message_names_step() {
        let res: Result<(), anyhow::Error> = Err(anyhow::anyhow!("boom"));
        let failure = res.at(PipelineStep::Align).unwrap_err();
        assert_eq!(failure.step, PipelineStep::Align);
        assert_eq!(failure.to_string(), "align: boom");
    }
}
