//! # spindlestats: batch sleep-spindle statistics from EDF recordings
//!
//! `spindlestats` walks an archive of overnight EEG recordings, detects
//! sleep spindles on every channel, and appends per-subject summary tables
//! to one shared `.xlsx` workbook. Detection, filtering, resampling and EDF
//! decoding are all native Rust on top of [RustFFT](https://crates.io/crates/rustfft).
//!
//! ## Pipeline overview
//!
//! ```text
//! Archive/NAME.edf            sleepScorer/NAME_ODS.ods
//!   │                           │
//!   ├─ edf::read_edf()          ├─ hypno::read_hypnogram()   W/1/2/3/R → 0..4
//!   │   [C, T] µV               │   one label per 30 s epoch
//!   │                           └─ hypno::upsample_to_data()  one label per sample
//!   │                                  │
//!   └──────────────┬───────────────────┘
//!                  ├─ detect::detect_spindles(hypno)   pass 1 (stages 0–4)
//!                  │     ├─ summary by (Stage, Channel)
//!                  │     └─ summary by Stage
//!                  ├─ detect::detect_spindles(None)    pass 2
//!                  │     └─ summary by Channel
//!                  └─ workbook::write_subject_tables()  sheet NAME, 3 stacked tables
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use spindlestats::{run_batch, BatchConfig, ErrorLog};
//!
//! let cfg = BatchConfig::default();                 // Archive/ + sleepScorer/
//! let errors = ErrorLog::new(&cfg.error_log);
//! let report = run_batch(&cfg, &errors, |name| println!("{name}")).unwrap();
//! println!("{} written, {} failed", report.n_written(), report.n_failed());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use spindlestats::{read_edf, read_hypnogram, upsample_to_data, detect_spindles};
//! use spindlestats::{Aggregate, SpindleConfig};
//!
//! let rec   = read_edf("Archive/subj1.edf").unwrap();
//! let hypno = read_hypnogram("sleepScorer/subj1_ODS.ods", 1).unwrap();
//! let dense = upsample_to_data(&hypno.codes(), 1.0 / 30.0, rec.sfreq, rec.n_times()).unwrap();
//!
//! let events = detect_spindles(&rec, Some(&dense), &[2, 3], &SpindleConfig::default()).unwrap();
//! let by_stage = events.summary(false, true, Aggregate::Mean).unwrap();
//! println!("{:?}", by_stage.header());
//! ```

pub mod batch;
pub mod config;
pub mod detect;
pub mod edf;
pub mod filter;
pub mod hypno;
pub mod resample;
pub mod summary;
pub mod workbook;

use anyhow::{bail, Result};

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{BatchConfig, SpindleConfig};

// batch: per-file failure boundary
pub use batch::{
    discover, is_recording, process_file, run_batch,
    ErrorLog, FileFailure, FileOutcome, PipelineStep, RunReport,
};

// detect
pub use detect::{detect_spindles, Spindle, SpindleEvents};

// edf: reader + writer
pub use edf::{read_edf, write_edf, Recording};

// filter: design helpers + convolution
pub use filter::{
    auto_l_trans_bandwidth, auto_h_trans_bandwidth, auto_filter_length,
    design_bandpass, firwin_bandpass, hamming,
    apply_fir_zero_phase, filter_1d,
};

// hypno
pub use hypno::{
    map_stage, read_hypnogram, resample_labels, upsample_to_data,
    HypnoError, Hypnogram, Stage, STAGE_MAP,
};

// resample
pub use resample::{resample, resample_1d, auto_npad};

// summary
pub use summary::{Aggregate, IndexValue, SummaryRow, SummaryTable};

// workbook
pub use workbook::{ensure_workbook, table_offsets, write_subject_tables, WriteReport, TABLE_GAP_ROWS};

/// The three summary tables written for one subject.
#[derive(Debug, Clone)]
pub struct SubjectTables {
    /// Staged pass grouped by (Stage, Channel).
    pub stage_channel: SummaryTable,
    /// Staged pass grouped by Stage.
    pub stage: SummaryTable,
    /// Unstaged pass grouped by Channel.
    pub channel: SummaryTable,
    /// Events found by each pass.
    pub n_staged: usize,
    pub n_unstaged: usize,
}

impl SubjectTables {
    /// Tables in sheet order.
    pub fn as_refs(&self) -> [&SummaryTable; 3] {
        [&self.stage_channel, &self.stage, &self.channel]
    }
}

/// Detect and summarise one subject.
///
/// Runs the detector twice:
///
/// 1. with the dense hypnogram, restricted to `include` → summaries by
///    (Stage, Channel) and by Stage;
/// 2. without a hypnogram → summary by Channel.
///
/// All summaries use the mean.
///
/// # Errors
///
/// Fails when either pass finds no spindle at all, or when detection itself
/// fails (bad hypnogram length, no sample in `include`, bands above Nyquist).
pub fn summarize_subject(
    rec: &Recording,
    dense_hypno: &[u8],
    include: &[u8],
    cfg: &SpindleConfig,
) -> Result<SubjectTables> {
    let staged = detect_spindles(rec, Some(dense_hypno), include, cfg)?;
    if staged.is_empty() {
        bail!("no spindles detected in stages {include:?}");
    }
    let stage_channel = staged.summary(true, true, Aggregate::Mean)?;
    let stage = staged.summary(false, true, Aggregate::Mean)?;

    let unstaged = detect_spindles(rec, None, include, cfg)?;
    if unstaged.is_empty() {
        bail!("no spindles detected");
    }
    let channel = unstaged.summary(true, false, Aggregate::Mean)?;

    log::info!(
        "{} spindles with hypnogram, {} without",
        staged.len(),
        unstaged.len()
    );
    Ok(SubjectTables {
        stage_channel,
        stage,
        channel,
        n_staged: staged.len(),
        n_unstaged: unstaged.len(),
    })
}
