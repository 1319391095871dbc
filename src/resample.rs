//! Fourier-domain rate conversion for EEG channels.
//!
//! Two places in the pipeline change a signal's sampling rate:
//!
//! - [`crate::edf::read_edf`] brings slow channels of a mixed-rate EDF
//!   (SpO2, body position, ...) up to the rate of the EEG so every row of the
//!   recording shares one clock.
//! - [`crate::detect_spindles`] optionally brings a long overnight recording
//!   down to [`crate::SpindleConfig::resample_sfreq`] before filtering, which
//!   shortens every FIR and STFT pass that follows.
//!
//! ```text
//!   x ─► odd-reflect pad ─► FFT ─► crop / zero-extend spectrum ─► IFFT ─► trim pad ─► y
//!        (to a power of 2)          (Nyquist bin split/folded)
//! ```
//!
//! Cropping the spectrum is an ideal low-pass at the new Nyquist, so a 12-15 Hz
//! spindle survives any target rate above 30 Hz unchanged.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::filter::apply::reflect_limited_pad;

/// Padding that lifts `n` samples to the next power of two, keeping at least
/// `2 · min(n / 8, 100)` extra samples. Returns `(left, right)`.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let total = (n + min_add).next_power_of_two() - n;
    (total / 2, total - total / 2)
}

/// Resample `data` (`[C, T]`) from `src_sfreq` to `dst_sfreq`.
///
/// Output length is `round(T · dst / src)`.
pub fn resample(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    if src_sfreq <= 0.0 || dst_sfreq <= 0.0 {
        bail!("sampling rates must be positive: {src_sfreq} Hz -> {dst_sfreq} Hz");
    }
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(data.clone());
    }
    let ratio = dst_sfreq / src_sfreq;
    let (n_ch, n_in) = data.dim();
    let n_out = (ratio * n_in as f64).round() as usize;
    log::debug!("resampling {n_ch} channel(s) {src_sfreq} Hz -> {dst_sfreq} Hz ({n_in} -> {n_out} samples)");

    let pad = auto_npad(n_in);
    let mut rs = FftResampler::new(ratio);
    let mut out = Array2::<f64>::zeros((n_ch, n_out));
    for (row, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
        let y = rs.run(&row.to_vec(), pad);
        dst.assign(&ArrayView1::from(&y));
    }
    Ok(out)
}

/// Resample one signal by `ratio` with explicit `(npad_l, npad_r)` padding.
pub fn resample_1d(x: &[f64], ratio: f64, npad_l: usize, npad_r: usize) -> Result<Vec<f64>> {
    if ratio <= 0.0 || !ratio.is_finite() {
        bail!("resampling ratio must be positive, got {ratio}");
    }
    Ok(FftResampler::new(ratio).run(x, (npad_l, npad_r)))
}

/// Holds the FFT planner so plans are shared across the channels of one call.
struct FftResampler {
    ratio: f64,
    planner: FftPlanner<f64>,
}

impl FftResampler {
    fn new(ratio: f64) -> Self {
        Self { ratio, planner: FftPlanner::new() }
    }

    fn scaled(&self, n: usize) -> usize {
        (self.ratio * n as f64).round() as usize
    }

    fn run(&mut self, x: &[f64], (npad_l, npad_r): (usize, usize)) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let n_out = self.scaled(x.len());
        let pad_l = npad_l.min(x.len() - 1);
        let pad_r = npad_r.min(x.len() - 1);

        let padded = reflect_limited_pad(x, pad_l, pad_r);
        let m_in = padded.len();
        let m_out = self.scaled(m_in);
        if m_out == 0 {
            return vec![0.0; n_out];
        }

        // ── forward ──
        let mut spec: Vec<Complex<f64>> = padded.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.planner.plan_fft_forward(m_in).process(&mut spec);

        // ── move to the new length ──
        let mut half = spec[..m_in / 2 + 1].to_vec();
        let band = m_in.min(m_out);
        if band % 2 == 0 && band / 2 < half.len() {
            half[band / 2] *= if m_out < m_in { 2.0 } else { 0.5 };
        }
        // Rate scaling (m_out / m_in) times the unnormalised IFFT's 1 / m_out.
        let gain = 1.0 / m_in as f64;
        let keep = half.len().min(m_out / 2 + 1);
        let mut full = vec![Complex::<f64>::default(); m_out];
        for (k, &c) in half[..keep].iter().enumerate() {
            full[k] = c * gain;
            if k > 0 && m_out - k >= keep {
                full[m_out - k] = full[k].conj();
            }
        }

        // ── inverse, then trim the padding back off ──
        self.planner.plan_fft_inverse(m_out).process(&mut full);
        let skip = self.scaled(pad_l).min(m_out);
        let mut y: Vec<f64> = full[skip..].iter().take(n_out).map(|c| c.re).collect();
        y.resize(n_out, 0.0);
        y
    }
}
