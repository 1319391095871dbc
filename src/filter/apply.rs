//! Zero-phase FIR filtering for the spindle detector.
//!
//! Each channel goes through this twice per detection run: once with the
//! broadband kernel (relative-power and detrending path) and once with the
//! sigma kernel (envelope, correlation and RMS path). Both outputs have to
//! line up sample-for-sample with the raw signal, so the filter is made
//! zero-phase by advancing the linear-phase output by `(N-1)/2` samples
//! instead of filtering forward and back.
//!
//! ```text
//!  x ──► odd-reflect N-1 each side ──► FFT blocks of L = n_fft - N + 1 ──► × H ──► IFFT
//!                                                                              │
//!  y ◄── drop the N-1 edge samples ◄── overlap-add, advanced by (N-1)/2 ◄──────┘
//! ```
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Filter every channel of `data` (`[C, T]`) in place with the odd-length
/// kernel `h`.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    let n_times = data.ncols();
    if n_times == 0 {
        return Ok(());
    }
    let fir = ZeroPhaseFir::new(h, n_times)?;
    for mut row in data.rows_mut() {
        let y = fir.run(&row.to_vec());
        row.assign(&ArrayView1::from(&y));
    }
    Ok(())
}

/// Filter one signal with the odd-length kernel `h`. Output has `x.len()`
/// samples.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Ok(Vec::new());
    }
    Ok(ZeroPhaseFir::new(h, x.len())?.run(x))
}

/// A kernel transformed once and planned for signals of one length.
struct ZeroPhaseFir {
    n_taps: usize,
    n_fft: usize,
    spectrum: Vec<Complex<f64>>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl ZeroPhaseFir {
    fn new(h: &[f64], n_signal: usize) -> Result<Self> {
        let n_taps = h.len();
        if n_taps % 2 == 0 {
            bail!("zero-phase FIR needs an odd number of taps, got {n_taps}");
        }
        let n_fft = block_len(n_taps, n_signal + 2 * (n_taps - 1));
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        let mut spectrum = zero_extended(h, n_fft);
        forward.process(&mut spectrum);
        // Fold the IFFT normalisation into the kernel.
        let norm = 1.0 / n_fft as f64;
        spectrum.iter_mut().for_each(|c| *c *= norm);

        Ok(Self { n_taps, n_fft, spectrum, forward, inverse })
    }

    fn run(&self, x: &[f64]) -> Vec<f64> {
        let edge = self.n_taps - 1;
        let delay = edge / 2;
        let ext = reflect_limited_pad(x, edge, edge);
        let step = self.n_fft - self.n_taps + 1;

        let mut acc = vec![0.0_f64; ext.len()];
        for start in (0..ext.len()).step_by(step) {
            let stop = (start + step).min(ext.len());
            let mut block = zero_extended(&ext[start..stop], self.n_fft);
            self.forward.process(&mut block);
            block.iter_mut().zip(&self.spectrum).for_each(|(b, h)| *b *= h);
            self.inverse.process(&mut block);

            // Block sample p lands at start + p - delay.
            let skip = delay.saturating_sub(start);
            let first = start + skip - delay;
            for (slot, c) in acc[first..].iter_mut().zip(&block[skip..]) {
                *slot += c.re;
            }
        }
        acc.drain(..edge);
        acc.truncate(x.len());
        acc
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn zero_extended(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::<f64>::default(); n];
    for (o, &v) in out.iter_mut().zip(x) {
        o.re = v;
    }
    out
}

/// Odd reflection about each end of `x`, `n_l` samples before and `n_r`
/// after. Requests longer than `x.len() - 1` are made up with zeros on the
/// outside.
///
/// ```text
/// left[i]  = 2·x[0]   - x[i]        i = n_l..1
/// right[i] = 2·x[n-1] - x[n-1-i]    i = 1..n_r
/// ```
pub(crate) fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let l = n_l.min(n - 1);
    let r = n_r.min(n - 1);
    let (first, last) = (x[0], x[n - 1]);

    let mut out = vec![0.0; n_l - l];
    out.reserve(n + n_r);
    out.extend((1..=l).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.resize(n_l + n + n_r, 0.0);
    out
}

/// Power-of-two block length minimising the overlap-add cost for an
/// `n_taps` kernel over `n_x` samples.
///
/// `cost(N) = ceil(n_x / (N - n_taps + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`
fn block_len(n_taps: usize, n_x: usize) -> usize {
    let smallest = (2 * n_taps - 1).next_power_of_two();
    let largest = (2 * n_x.max(1)).next_power_of_two().max(smallest);
    let cost = |n: usize| {
        let blocks = (n_x as f64 / (n - n_taps + 1) as f64).ceil();
        blocks * n as f64 * ((n.trailing_zeros() + 1) as f64) + 4e-5 * n as f64 * n_x as f64
    };
    std::iter::successors(Some(smallest), |&n| (n < largest).then_some(n * 2))
        .min_by(|&a, &b| cost(a).total_cmp(&cost(b)))
        .unwrap_or(smallest)
}
