//! Run configuration.
//!
//! [`SpindleConfig`] holds every tunable parameter of the spindle detector,
//! [`BatchConfig`] the directory layout and file-naming rules of a batch run.
//! All defaults reproduce the fixed layout the lab scripts have always used.
use std::path::{Path, PathBuf};

/// Spindle detector parameters.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use spindlestats::SpindleConfig;
///
/// let cfg = SpindleConfig {
///     resample_sfreq: Some(100.0),   // detect at 100 Hz
///     thresh_corr:    0.7,           // stricter correlation threshold
///     ..SpindleConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpindleConfig {
    /// Sigma band `(low, high)` in Hz.
    ///
    /// Filtered with explicit 1.5 Hz transition bands on both sides
    /// (see [`sigma_trans_bandwidth`](Self::sigma_trans_bandwidth)).
    ///
    /// Default: `(12.0, 15.0)`.
    pub freq_sp: (f64, f64),

    /// Broad band `(low, high)` in Hz used for relative power and the
    /// moving correlation. Transition bands are chosen automatically.
    ///
    /// Default: `(1.0, 30.0)`.
    pub freq_broad: (f64, f64),

    /// Accepted spindle duration `(min, max)` in seconds, both exclusive.
    ///
    /// Default: `(0.5, 2.0)`.
    pub duration: (f64, f64),

    /// Candidates closer than this many milliseconds are merged.
    ///
    /// Default: `500.0`.
    pub min_distance_ms: f64,

    /// Minimum sigma share of broad-band STFT power.
    ///
    /// Default: `0.2`.
    pub thresh_rel_pow: f64,

    /// Minimum moving Pearson correlation between sigma and broad band.
    ///
    /// Default: `0.65`.
    pub thresh_corr: f64,

    /// Moving-RMS threshold, in trimmed standard deviations above the mean.
    ///
    /// Default: `1.5`.
    pub thresh_rms: f64,

    /// Upper bound on the absolute RMS threshold in µV.
    ///
    /// Artefact-heavy channels otherwise push the threshold out of reach.
    ///
    /// Default: `10.0`.
    pub rms_cap: f64,

    /// Transition bandwidth of the sigma filter on each side, in Hz.
    ///
    /// Default: `1.5`.
    pub sigma_trans_bandwidth: f64,

    /// Downsample the signal to this rate before detection.
    ///
    /// Ignored when not below the recording's own rate.
    ///
    /// Default: `None` (detect at the native rate).
    pub resample_sfreq: Option<f64>,
}

impl Default for SpindleConfig {
    /// 12–15 Hz sigma · 1–30 Hz broad · 0.5–2 s · thresholds 0.2 / 0.65 / 1.5.
    fn default() -> Self {
        Self {
            freq_sp: (12.0, 15.0),
            freq_broad: (1.0, 30.0),
            duration: (0.5, 2.0),
            min_distance_ms: 500.0,
            thresh_rel_pow: 0.2,
            thresh_corr: 0.65,
            thresh_rms: 1.5,
            rms_cap: 10.0,
            sigma_trans_bandwidth: 1.5,
            resample_sfreq: None,
        }
    }
}

/// Batch layout and naming rules.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Directory holding the EDF recordings.
    pub archive_dir: PathBuf,
    /// Directory holding the per-subject scoring spreadsheets.
    pub scoring_dir: PathBuf,
    /// Output workbook, created with a title sheet when missing.
    pub output: PathBuf,
    /// Plain-text error log; one line appended per failed file.
    pub error_log: PathBuf,

    /// Recording suffix, matched case-sensitively on the last 4 characters.
    ///
    /// Default: `".edf"`.
    pub recording_suffix: String,

    /// Appended to the stripped recording stem to form the scoring file name.
    ///
    /// Default: `"_ODS.ods"`.
    pub scoring_suffix: String,

    /// Token removed (every occurrence) from the stem before adding
    /// [`scoring_suffix`](Self::scoring_suffix).
    ///
    /// Default: `"NS"`.
    pub strip_token: String,

    /// Scoring epoch length in seconds.
    ///
    /// Default: `30.0`.
    pub epoch_secs: f64,

    /// Header rows skipped at the top of the scoring sheet.
    ///
    /// Default: `1`.
    pub scoring_header_rows: usize,

    /// Stage codes kept by the staged detection pass.
    ///
    /// Default: `[0, 1, 2, 3, 4]`.
    pub include: Vec<u8>,

    pub spindle: SpindleConfig,
}

impl Default for BatchConfig {
    /// `Archive/` + `sleepScorer/` → `SpindleStats.xlsx`, errors in `errorLogFile.txt`.
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("Archive"),
            scoring_dir: PathBuf::from("sleepScorer"),
            output: PathBuf::from("SpindleStats.xlsx"),
            error_log: PathBuf::from("errorLogFile.txt"),
            recording_suffix: ".edf".into(),
            scoring_suffix: "_ODS.ods".into(),
            strip_token: "NS".into(),
            epoch_secs: 30.0,
            scoring_header_rows: 1,
            include: vec![0, 1, 2, 3, 4],
            spindle: SpindleConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Sheet name for a recording: its file name minus the recording suffix.
    ///
    /// ```
    /// use spindlestats::BatchConfig;
    /// let cfg = BatchConfig::default();
    /// assert_eq!(cfg.sheet_name_for("NS012.edf"), "NS012");
    /// ```
    pub fn sheet_name_for(&self, file_name: &str) -> String {
        file_name
            .strip_suffix(self.recording_suffix.as_str())
            .unwrap_or(file_name)
            .to_string()
    }

    /// Scoring file path for a recording.
    ///
    /// ```
    /// use std::path::Path;
    /// use spindlestats::BatchConfig;
    /// let cfg = BatchConfig::default();
    /// assert_eq!(
    ///     cfg.scoring_path_for("NS012.edf"),
    ///     Path::new("sleepScorer").join("012_ODS.ods"),
    /// );
    /// ```
    pub fn scoring_path_for(&self, file_name: &str) -> PathBuf {
        let stem = self.sheet_name_for(file_name);
        let stripped = if self.strip_token.is_empty() {
            stem
        } else {
            stem.replace(self.strip_token.as_str(), "")
        };
        self.scoring_dir.join(format!("{stripped}{}", self.scoring_suffix))
    }

    /// Full path of a recording in the archive.
    pub fn recording_path(&self, file_name: &str) -> PathBuf {
        self.archive_dir.join(file_name)
    }

    /// Hypnogram rate in Hz (one label per epoch).
    #[inline]
    pub fn sf_hypno(&self) -> f64 {
        1.0 / self.epoch_secs
    }

    /// Re-root all four paths under `dir`.
    pub fn rooted_at(mut self, dir: &Path) -> Self {
        self.archive_dir = dir.join(&self.archive_dir);
        self.scoring_dir = dir.join(&self.scoring_dir);
        self.output = dir.join(&self.output);
        self.error_log = dir.join(&self.error_log);
        self
    }
}
