//! Sleep-spindle detection.
//!
//! Each channel is scored sample by sample against three thresholds, and
//! samples that pass all of them (after 100 ms smoothing) form candidate
//! events:
//!
//! ```text
//! x ──┬─ FIR 1–30 Hz ──┬─ STFT (2 s / 0.2 s) ─ Σ sigma bins ─► rel_pow  ≥ 0.2
//!     │                └──────────────┐
//!     └─ FIR 12–15 Hz ─┬─ moving corr ┘ (0.3 s / 0.1 s) ─────► mcorr    ≥ 0.65
//!                      ├─ moving RMS ────────────────────────► mrms     ≥ mean + 1.5·tstd
//!                      └─ Hilbert ─► inst. power / frequency   (event features)
//!
//! Σ passed ─► ×mask ─► boxcar 100 ms ─► > 2 ─► merge gaps < 500 ms ─► 0.5 s < dur < 2 s
//! ```
//!
//! The mask restricts detection to samples whose stage is in `include`
//! (every sample when no hypnogram is given).
pub mod moving;
pub mod peaks;
pub mod spectral;

use std::borrow::Cow;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use crate::config::SpindleConfig;
use crate::edf::Recording;
use crate::filter::{design_bandpass, filter_1d};
use crate::hypno::resample_labels;
use crate::resample::resample;

use moving::{interp_linear, median, moving_transform, rms, trimbothstd, MovingStat};
use peaks::{detrend_linear, find_peaks, ptp};
use spectral::{hilbert, instantaneous, stft_power};

/// STFT window and step (s) for relative power.
const STFT_WINDOW: f64 = 2.0;
const STFT_STEP: f64 = 0.2;
/// Moving correlation / RMS window and step (s).
const MOVING_WINDOW: f64 = 0.3;
const MOVING_STEP: f64 = 0.1;
/// Smoothing boxcar length (s).
const SMOOTH_WINDOW: f64 = 0.1;
/// Minimum spacing (ms) of oscillation peaks; a 16 Hz cycle is 62.5 ms.
const PEAK_DISTANCE_MS: f64 = 60.0;
/// Trim fraction for the RMS threshold and the flat-channel check.
const TRIM_CUT: f64 = 0.10;
/// Number of thresholds a sample must pass.
const N_THRESH: usize = 3;

/// One detected spindle.
#[derive(Debug, Clone, PartialEq)]
pub struct Spindle {
    /// Start, most prominent peak and end time (s).
    pub start: f64,
    pub peak: f64,
    pub end: f64,
    pub duration: f64,
    /// Peak-to-peak amplitude of the detrended sigma signal (µV).
    pub amplitude: f64,
    pub rms: f64,
    /// Median log10 instantaneous sigma power (log10 µV²).
    pub abs_power: f64,
    /// Median sigma share of broad-band power.
    pub rel_power: f64,
    /// Median instantaneous frequency (Hz).
    pub frequency: f64,
    pub oscillations: usize,
    /// Position of the peak within the event, 0–1.
    pub symmetry: f64,
    /// Stage code of the first sample, when detected with a hypnogram.
    pub stage: Option<u8>,
    pub channel: String,
    pub idx_channel: usize,
}

/// Event table of one detector run, plus what the summaries need to know
/// about that run.
#[derive(Debug, Clone)]
pub struct SpindleEvents {
    pub events: Vec<Spindle>,
    /// Sampling rate the detector worked at.
    pub sfreq: f64,
    /// Dense hypnogram at `sfreq`, when the run was staged.
    pub hypno: Option<Vec<u8>>,
    pub include: Vec<u8>,
}

impl SpindleEvents {
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Detect spindles on every channel of `rec`.
///
/// `hypno` is a dense hypnogram (one code per sample of `rec`); when given,
/// only samples whose code is in `include` are considered and each event
/// carries its stage.
pub fn detect_spindles(
    rec: &Recording,
    hypno: Option<&[u8]>,
    include: &[u8],
    cfg: &SpindleConfig,
) -> Result<SpindleEvents> {
    if let Some(h) = hypno {
        if h.len() != rec.n_times() {
            bail!("hypnogram has {} samples, recording has {}", h.len(), rec.n_times());
        }
    }

    // ── Optional downsampling ───────────────────────────────────────────────
    let (data, sf, hypno): (Cow<'_, Array2<f64>>, f64, Option<Vec<u8>>) =
        match cfg.resample_sfreq {
            Some(target) if target < rec.sfreq => {
                log::info!("resampling {} Hz -> {} Hz before detection", rec.sfreq, target);
                let data = resample(&rec.data, rec.sfreq, target).context("resample recording")?;
                let n = data.ncols();
                let hypno = hypno.map(|h| resample_labels(h, rec.sfreq, target, n));
                (Cow::Owned(data), target, hypno)
            }
            _ => (Cow::Borrowed(&rec.data), rec.sfreq, hypno.map(<[u8]>::to_vec)),
        };
    let n = data.ncols();

    let mask: Vec<bool> = match &hypno {
        Some(h) => h.iter().map(|c| include.contains(c)).collect(),
        None => vec![true; n],
    };
    if !mask.iter().any(|&m| m) {
        bail!("none of the stages {include:?} are present in the hypnogram");
    }

    // ── Filters ────────────────────────────────────────────────────────────
    let nyq = sf / 2.0;
    if cfg.freq_broad.1 >= nyq || cfg.freq_sp.1 >= nyq {
        bail!(
            "detection bands {:?} / {:?} Hz do not fit below Nyquist ({nyq} Hz)",
            cfg.freq_broad, cfg.freq_sp
        );
    }
    let h_broad = design_bandpass(cfg.freq_broad.0, cfg.freq_broad.1, sf, None, None);
    let h_sigma = design_bandpass(
        cfg.freq_sp.0,
        cfg.freq_sp.1,
        sf,
        Some(cfg.sigma_trans_bandwidth),
        Some(cfg.sigma_trans_bandwidth),
    );
    log::debug!("broad FIR {} taps, sigma FIR {} taps at {sf} Hz", h_broad.len(), h_sigma.len());

    let mut events = Vec::new();
    for (c, name) in rec.ch_names.iter().enumerate() {
        let x = data.row(c).to_vec();
        if ptp(&x) == 0.0 || trimbothstd(&x, TRIM_CUT) == 0.0 {
            log::warn!("channel {name} is flat; skipped");
            continue;
        }
        let found = detect_channel(&x, sf, &mask, hypno.as_deref(), &h_broad, &h_sigma, cfg)
            .with_context(|| format!("detect spindles on channel {name}"))?;
        log::debug!("channel {name}: {} spindle(s)", found.len());
        events.extend(found.into_iter().map(|f| f.into_spindle(name, c)));
    }

    Ok(SpindleEvents { events, sfreq: sf, hypno, include: include.to_vec() })
}

/// Event features before channel attribution.
struct Features {
    start: f64,
    peak: f64,
    end: f64,
    amplitude: f64,
    rms: f64,
    abs_power: f64,
    rel_power: f64,
    frequency: f64,
    oscillations: usize,
    symmetry: f64,
    stage: Option<u8>,
}

impl Features {
    fn into_spindle(self, channel: &str, idx_channel: usize) -> Spindle {
        Spindle {
            start: self.start,
            peak: self.peak,
            end: self.end,
            duration: self.end - self.start,
            amplitude: self.amplitude,
            rms: self.rms,
            abs_power: self.abs_power,
            rel_power: self.rel_power,
            frequency: self.frequency,
            oscillations: self.oscillations,
            symmetry: self.symmetry,
            stage: self.stage,
            channel: channel.to_string(),
            idx_channel,
        }
    }
}

fn detect_channel(
    x: &[f64],
    sf: f64,
    mask: &[bool],
    hypno: Option<&[u8]>,
    h_broad: &[f64],
    h_sigma: &[f64],
    cfg: &SpindleConfig,
) -> Result<Vec<Features>> {
    let n = x.len();
    let broad = filter_1d(x, h_broad)?;
    let sigma = filter_1d(x, h_sigma)?;
    let (inst_pow, inst_freq) = instantaneous(&hilbert(&sigma), sf);

    // ── Per-sample threshold signals ─────────────────────────────────────────
    let stft = stft_power(&broad, sf, STFT_WINDOW, STFT_STEP, cfg.freq_broad)?;
    let grid: Vec<f64> = (0..n).map(|i| i as f64 / sf).collect();
    let rel_pow = interp_linear(&stft.times, &stft.band_sum(cfg.freq_sp.0, cfg.freq_sp.1), &grid);
    let mcorr = moving_transform(&sigma, &broad, sf, MOVING_WINDOW, MOVING_STEP, MovingStat::Corr);
    let mrms = moving_transform(&sigma, &sigma, sf, MOVING_WINDOW, MOVING_STEP, MovingStat::Rms);

    let masked: Vec<f64> = mrms.iter().zip(mask).filter_map(|(&v, &m)| m.then_some(v)).collect();
    let thresh_rms = (moving::mean(&masked) + cfg.thresh_rms * trimbothstd(&masked, TRIM_CUT))
        .min(cfg.rms_cap);
    log::debug!("rms threshold {thresh_rms:.3} uV");

    let passed: Vec<usize> = (0..n)
        .map(|i| {
            if !mask[i] {
                return 0;
            }
            usize::from(rel_pow[i] >= cfg.thresh_rel_pow)
                + usize::from(mcorr[i] >= cfg.thresh_corr)
                + usize::from(mrms[i] >= thresh_rms)
        })
        .collect();

    // ── Candidate runs ─────────────────────────────────────────────────────
    let w = ((SMOOTH_WINDOW * sf) as usize).max(1);
    let smoothed = boxcar_same(&passed, w);
    let where_sp: Vec<usize> = (0..n).filter(|&i| smoothed[i] > (N_THRESH - 1) * w).collect();
    let where_sp = merge_close(&where_sp, cfg.min_distance_ms, sf);

    let distance = PEAK_DISTANCE_MS * sf / 1000.0;
    let mut out = Vec::new();
    for (a, b) in runs(&where_sp) {
        let start = a as f64 / sf;
        let end = b as f64 / sf;
        let dur = end - start;
        if !(dur > cfg.duration.0 && dur < cfg.duration.1) {
            continue;
        }

        let det = detrend_linear(&sigma[a..=b]);
        let log_pow: Vec<f64> = inst_pow[a..=b].iter().filter(|&&p| p > 0.0).map(|p| p.log10()).collect();
        let pos_freq: Vec<f64> = inst_freq[a..=b].iter().copied().filter(|&f| f > 0.0).collect();

        let peaks = find_peaks(&det, distance);
        let pk = match peaks.iter().max_by(|p, q| p.prominence.total_cmp(&q.prominence).then(q.index.cmp(&p.index))) {
            Some(p) => p.index,
            None => argmax(&det),
        };

        out.push(Features {
            start,
            peak: start + pk as f64 / sf,
            end,
            amplitude: ptp(&det),
            rms: rms(&det),
            abs_power: median(&log_pow),
            rel_power: median(&rel_pow[a..=b]),
            frequency: median(&pos_freq),
            oscillations: peaks.len(),
            symmetry: pk as f64 / det.len() as f64,
            stage: hypno.map(|h| h[a]),
        });
    }
    Ok(out)
}

/// Window sums of `x` with a length-`w` boxcar, aligned like
/// `np.convolve(x, ones(w), 'same')`.
fn boxcar_same(x: &[usize], w: usize) -> Vec<usize> {
    let n = x.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for &v in x {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }
    let off = (w - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = (i + off).min(n - 1);
            let lo = (i + off + 1).saturating_sub(w);
            prefix[hi + 1] - prefix[lo]
        })
        .collect()
}

/// Fill gaps between sorted indices that are shorter than `min_distance_ms`.
fn merge_close(index: &[usize], min_distance_ms: f64, sf: f64) -> Vec<usize> {
    let min_distance = min_distance_ms / 1000.0 * sf;
    let mut out = Vec::with_capacity(index.len());
    for (k, &i) in index.iter().enumerate() {
        out.push(i);
        if let Some(&next) = index.get(k + 1) {
            let gap = next - i;
            if gap > 1 && (gap as f64) < min_distance {
                out.extend(i + 1..next);
            }
        }
    }
    out
}

/// Contiguous runs of sorted indices as inclusive `(first, last)` pairs.
fn runs(index: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &i in index {
        match out.last_mut() {
            Some((_, last)) if *last + 1 == i => *last = i,
            _ => out.push((i, i)),
        }
    }
    out
}

fn argmax(x: &[f64]) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}
