//! EDF / EDF+ recording loader.
//!
//! # Algorithm
//! 1. Open the file with `edf-reader`'s synchronous reader and read the whole
//!    time window (physical values, one vector per signal).
//! 2. Drop EDF+ annotation signals.
//! 3. Scale each signal's physical unit to µV.
//! 4. Bring every signal to the highest sampling rate in the file, FFT
//!    resampling the slower ones, and stack them into `[n_chan, n_times]`.
//!
//! ```text
//! C3-M2  256 Hz ───────────────────────────┐
//! C4-M1  256 Hz ───────────────────────────┼─► [n_chan, n_blocks × 256]
//! SpO2     1 Hz ─ resample 1 → 256 Hz ─────┘
//! ```
use std::path::Path;

use anyhow::{bail, Context, Result};
use local_edf_reader::init_sync_reader;
use ndarray::Array2;

use crate::resample::resample;

/// Label that marks an EDF+ annotation signal.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

/// A fully loaded multi-channel recording.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Channel labels, in file order (annotation signals excluded).
    pub ch_names: Vec<String>,
    /// Sampling frequency in Hz, shared by all channels.
    pub sfreq: f64,
    /// `[n_chan, n_times]` samples in microvolts.
    pub data: Array2<f64>,
}

impl Recording {
    #[inline]
    pub fn n_chan(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Total duration in seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }
}

/// Factor converting a physical dimension to microvolts.
///
/// Unknown dimensions (including empty ones) are taken as already in µV.
pub fn to_microvolts(dimension: &str) -> f64 {
    match dimension.trim() {
        "nV" => 1e-3,
        "uV" | "µV" | "μV" => 1.0,
        "mV" => 1e3,
        "V" => 1e6,
        _ => 1.0,
    }
}

/// One data signal as stored in the file.
struct Signal {
    label: String,
    samples_per_record: u64,
    samples: Vec<f64>,
}

/// Read an EDF / EDF+ file into memory.
pub fn read_edf<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("recording {} does not exist", path.display());
    }
    let reader = init_sync_reader(&*path.to_string_lossy())
        .with_context(|| format!("open EDF reader on {}", path.display()))?;
    let header = &reader.edf_header;

    let block_ms = header.block_duration;
    let total_ms = header.number_of_blocks * block_ms;
    if block_ms == 0 || header.number_of_blocks == 0 {
        bail!("{} holds no data records", path.display());
    }
    log::debug!(
        "{}: {} signal(s), {} record(s) of {} ms",
        path.display(),
        header.channels.len(),
        header.number_of_blocks,
        block_ms
    );

    let window = reader
        .read_data_window(0, total_ms)
        .with_context(|| format!("read data records of {}", path.display()))?;

    let signals: Vec<Signal> = header
        .channels
        .iter()
        .zip(window)
        .filter(|(ch, _)| ch.label.trim() != ANNOTATION_LABEL)
        .map(|(ch, samples)| {
            let unit = to_microvolts(&ch.physical_dimension);
            Signal {
                label: ch.label.trim().to_string(),
                samples_per_record: ch.number_of_samples_in_data_record,
                samples: samples.into_iter().map(|v| f64::from(v) * unit).collect(),
            }
        })
        .collect();

    stack_signals(signals, header.number_of_blocks as usize, block_ms as f64 / 1000.0)
        .with_context(|| format!("assemble channels of {}", path.display()))
}

/// Stack signals at the highest rate present, resampling slower ones.
fn stack_signals(signals: Vec<Signal>, n_blocks: usize, block_secs: f64) -> Result<Recording> {
    let Some(max_spr) = signals.iter().map(|s| s.samples_per_record).max() else {
        bail!("no data signals");
    };
    if max_spr == 0 {
        bail!("data signals store no samples");
    }
    let sfreq = max_spr as f64 / block_secs;
    let n_times = n_blocks * max_spr as usize;

    let mut data = Array2::<f64>::zeros((signals.len(), n_times));
    let mut ch_names = Vec::with_capacity(signals.len());
    for (c, sig) in signals.into_iter().enumerate() {
        let row = if sig.samples_per_record == max_spr {
            sig.samples
        } else if sig.samples.is_empty() {
            log::warn!("channel {} stores no samples; zero-filled", sig.label);
            vec![0.0; n_times]
        } else {
            let sf = sig.samples_per_record as f64 / block_secs;
            log::warn!("channel {} at {sf} Hz resampled to {sfreq} Hz", sig.label);
            let n = sig.samples.len();
            let one = Array2::from_shape_vec((1, n), sig.samples)?;
            resample(&one, sf, sfreq)?.row(0).to_vec()
        };
        let n = row.len().min(n_times);
        data.row_mut(c)
            .slice_mut(ndarray::s![..n])
            .assign(&ndarray::ArrayView1::from(&row[..n]));
        ch_names.push(sig.label);
    }
    Ok(Recording { ch_names, sfreq, data })
}
