//! Band-pass kernels for the broadband and sigma detector paths.
//!
//! The sigma kernel is designed with explicit 1.5 Hz transitions so that
//! 11 Hz alpha and 16 Hz beta stay out of the spindle envelope; the
//! broadband kernel uses the automatic rules below.
//!
//! For a band-pass between `l_freq` and `h_freq` Hz at sampling rate `sfreq`:
//!   • lower transition  = min(max(0.25 * l_freq, 2.0), l_freq)          (auto)
//!   • upper transition  = min(max(0.25 * h_freq, 2.0), sfreq/2 - h_freq) (auto)
//!   • filter length N   = ceil(3.3 / min(l_trans, h_trans) * sfreq), rounded to odd
//!   • cutoffs (-6 dB)   = l_freq - l_trans / 2  and  h_freq + h_trans / 2
//!   • Hamming-windowed sinc, scaled to unit gain at the band centre
use std::f64::consts::PI;

/// Transition-bandwidth length factor of the Hamming window.
pub const HAMMING_LENGTH_FACTOR: f64 = 3.3;

/// Automatic lower transition bandwidth.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_l_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Automatic upper transition bandwidth.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_h_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Compute the number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (HAMMING_LENGTH_FACTOR / trans_bw * sfreq).ceil().max(1.0) as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase band-pass FIR filter.
///
/// `l_trans` / `h_trans` override the automatic transition bandwidths; pass
/// `None` for the automatic rules. One length, set by the narrower
/// transition, serves both edges.
///
/// Returns the impulse response `h[N]`.
pub fn design_bandpass(
    l_freq: f64,
    h_freq: f64,
    sfreq: f64,
    l_trans: Option<f64>,
    h_trans: Option<f64>,
) -> Vec<f64> {
    let l_tb = l_trans.unwrap_or_else(|| auto_l_trans_bandwidth(l_freq));
    let h_tb = h_trans.unwrap_or_else(|| auto_h_trans_bandwidth(h_freq, sfreq));
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);

    let low_cut  = l_freq - l_tb / 2.0;
    let high_cut = (h_freq + h_tb / 2.0).min(sfreq / 2.0);
    firwin_bandpass(n, low_cut, high_cut, sfreq)
}

/// Band-pass `firwin(n, [low_hz, high_hz], pass_zero=False)`.
///
/// Built as the difference of two ideal lowpass kernels, windowed, then
/// scaled so that the response at the band centre is exactly 1.
pub fn firwin_bandpass(n: usize, low_hz: f64, high_hz: f64, sfreq: f64) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    assert!(low_hz < high_hz, "band edges must be increasing: {low_hz} >= {high_hz}");
    let nyq = sfreq / 2.0;
    let (f1, f2) = (low_hz / nyq, high_hz / nyq);
    let alpha = (n - 1) as f64 / 2.0;
    let win = hamming(n);

    let lp_hi = ideal_lowpass(n, f2);
    let lp_lo = ideal_lowpass(n, f1);
    let mut h: Vec<f64> = (0..n).map(|i| (lp_hi[i] - lp_lo[i]) * win[i]).collect();

    // Scale to unit gain at the centre frequency (scipy `scale=True`).
    let centre = 0.5 * (f1 + f2);
    let s: f64 = h
        .iter()
        .enumerate()
        .map(|(i, &v)| v * (PI * (i as f64 - alpha) * centre).cos())
        .sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Unwindowed ideal lowpass `fc · sinc(fc · m)` with `fc` normalised to Nyquist.
fn ideal_lowpass(n: usize, fc: f64) -> Vec<f64> {
    let alpha = (n - 1) as f64 / 2.0;
    (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) }
        })
        .collect()
}

/// Magnitude of the frequency response of `h` at `freq` Hz.
pub fn gain_at(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &v)| {
        (re + v * (w * k as f64).cos(), im - v * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}
