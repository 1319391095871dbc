//! Short-time power spectrum and analytic signal.
//!
//! STFT framing follows `scipy.signal.stft(boundary='zeros', padded=True)`:
//!
//! ```text
//!   x  ─►  [ 0 … 0 | x₀ … x_{n-1} | 0 … 0 | 0 … ]   nperseg/2 each side + tail fill
//!          ├─ nperseg ─┤
//!                ├─ nperseg ─┤            frame k starts at k · nstep
//!                      …
//!   t_k = k · nstep / sf
//! ```
use std::f64::consts::PI;

use anyhow::{bail, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Band-limited, column-normalised STFT power.
#[derive(Debug, Clone)]
pub struct StftPower {
    /// Bin frequencies (Hz) inside the requested band.
    pub freqs: Vec<f64>,
    /// Frame centre times (s).
    pub times: Vec<f64>,
    /// `[n_freqs, n_frames]` power; each column sums to 1 unless it is all zero.
    pub power: Array2<f64>,
}

impl StftPower {
    /// Sum of the rows whose frequency lies in `[lo, hi]`, one value per frame.
    pub fn band_sum(&self, lo: f64, hi: f64) -> Vec<f64> {
        let rows: Vec<usize> = (0..self.freqs.len())
            .filter(|&i| self.freqs[i] >= lo && self.freqs[i] <= hi)
            .collect();
        (0..self.times.len())
            .map(|t| rows.iter().map(|&f| self.power[[f, t]]).sum())
            .collect()
    }
}

/// Periodic Hann window (`scipy.signal.get_window('hann', n)`).
pub fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// STFT power of `x`, restricted to `band` and normalised per frame.
///
/// `window` and `step` are in seconds.
pub fn stft_power(x: &[f64], sf: f64, window: f64, step: f64, band: (f64, f64)) -> Result<StftPower> {
    let nperseg = (window * sf) as usize;
    let noverlap = ((window - step) * sf) as usize;
    if nperseg < 2 || noverlap >= nperseg {
        bail!("invalid STFT framing: window {window} s, step {step} s at {sf} Hz");
    }
    let nstep = nperseg - noverlap;

    // Boundary zeros, then tail zeros up to a whole number of frames.
    let half = nperseg / 2;
    let mut padded = vec![0.0; half];
    padded.extend_from_slice(x);
    padded.resize(padded.len() + half, 0.0);
    let nadd = (nstep - (padded.len().saturating_sub(nperseg)) % nstep) % nstep;
    padded.resize(padded.len().max(nperseg) + nadd, 0.0);
    let n_frames = (padded.len() - nperseg) / nstep + 1;

    let bins: Vec<usize> = (0..=nperseg / 2)
        .filter(|&k| {
            let f = k as f64 * sf / nperseg as f64;
            f >= band.0 && f <= band.1
        })
        .collect();
    let freqs: Vec<f64> = bins.iter().map(|&k| k as f64 * sf / nperseg as f64).collect();
    let times: Vec<f64> = (0..n_frames).map(|k| (k * nstep) as f64 / sf).collect();

    let win = hann_periodic(nperseg);
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut buf = vec![Complex::default(); nperseg];
    let mut power = Array2::<f64>::zeros((bins.len(), n_frames));

    for t in 0..n_frames {
        let seg = &padded[t * nstep..t * nstep + nperseg];
        for (b, (&v, &w)) in buf.iter_mut().zip(seg.iter().zip(win.iter())) {
            *b = Complex { re: v * w, im: 0.0 };
        }
        fft.process(&mut buf);
        let mut total = 0.0;
        for (f, &k) in bins.iter().enumerate() {
            let p = buf[k].norm_sqr();
            power[[f, t]] = p;
            total += p;
        }
        if total > 0.0 {
            power.column_mut(t).mapv_inplace(|p| p / total);
        }
    }

    Ok(StftPower { freqs, times, power })
}

/// Smallest `m >= n` whose only prime factors are 2, 3 and 5.
pub fn next_fast_len(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut m = n;
    loop {
        let mut r = m;
        for p in [2, 3, 5] {
            while r % p == 0 {
                r /= p;
            }
        }
        if r == 1 {
            return m;
        }
        m += 1;
    }
}

/// Analytic signal of `x` (`scipy.signal.hilbert(x, N=next_fast_len(n))[:n]`).
pub fn hilbert(x: &[f64]) -> Vec<Complex<f64>> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }
    let n_fft = next_fast_len(n);
    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n_fft)
        .collect();

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    planner.plan_fft_forward(n_fft).process(&mut buf);

    // h = [1, 2, …, 2, (1), 0, …, 0]
    for (k, b) in buf.iter_mut().enumerate() {
        let h = if k == 0 || (n_fft % 2 == 0 && k == n_fft / 2) {
            1.0
        } else if k < n_fft.div_ceil(2) {
            2.0
        } else {
            0.0
        };
        *b *= h;
    }

    planner.plan_fft_inverse(n_fft).process(&mut buf);
    let scale = 1.0 / n_fft as f64;
    buf.truncate(n);
    buf.iter_mut().for_each(|b| *b *= scale);
    buf
}

/// Instantaneous power `|a|²` and frequency `sf/2π · Δphase` of an analytic
/// signal. Frequency is padded with its last value to keep length `n`.
pub fn instantaneous(analytic: &[Complex<f64>], sf: f64) -> (Vec<f64>, Vec<f64>) {
    let pow: Vec<f64> = analytic.iter().map(|a| a.norm_sqr()).collect();
    let phase: Vec<f64> = analytic.iter().map(|a| a.arg()).collect();
    let mut freq: Vec<f64> = phase
        .windows(2)
        .map(|w| sf / (2.0 * PI) * (w[1] - w[0]))
        .collect();
    if let Some(&last) = freq.last() {
        freq.push(last);
    } else if !analytic.is_empty() {
        freq.push(0.0);
    }
    (pow, freq)
}
