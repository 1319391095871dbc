use spindlestats::filter::gain_at;
use spindlestats::{apply_fir_zero_phase, design_bandpass, filter_1d};
use ndarray::Array2;
use std::f64::consts::PI;

const SF: f64 = 100.0;

fn sine(freq: f64, amp: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| amp * (2.0 * PI * freq * i as f64 / SF).sin()).collect()
}

fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

// ── Coefficient tests ─────────────────────────────────────────────────────────

#[test]
fn broad_band_taps() {
    // 1 Hz lower transition dominates: ceil(3.3 / 1 * 100) = 330 → 331.
    let h = design_bandpass(1.0, 30.0, SF, None, None);
    assert_eq!(h.len(), 331);
    approx::assert_abs_diff_eq!(gain_at(&h, 15.0, SF), 1.0, epsilon = 1e-2);
}

#[test]
fn sigma_band_rejects_neighbours() {
    let h = design_bandpass(12.0, 15.0, SF, Some(1.5), Some(1.5));
    for f in [0.0, 2.0, 8.0, 20.0, 40.0] {
        assert!(gain_at(&h, f, SF) < 1e-2, "gain at {f} Hz = {}", gain_at(&h, f, SF));
    }
}

// ── Convolution tests ─────────────────────────────────────────────────────────

#[test]
fn zero_phase_keeps_in_band_sine() {
    let x = sine(13.5, 1.0, 3000);
    let h = design_bandpass(12.0, 15.0, SF, Some(1.5), Some(1.5));
    let y = filter_1d(&x, &h).unwrap();
    assert_eq!(y.len(), x.len());

    // No phase shift: interior samples track the input.
    let mid = &y[500..2500];
    let max_err = mid
        .iter()
        .zip(&x[500..2500])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_err < 0.05, "max interior error {max_err:.3}");
}

#[test]
fn out_of_band_sine_is_removed() {
    let x = sine(3.0, 50.0, 3000);
    let h = design_bandpass(12.0, 15.0, SF, Some(1.5), Some(1.5));
    let y = filter_1d(&x, &h).unwrap();
    assert!(rms(&y[500..2500]) < 0.5, "residual rms {:.3}", rms(&y[500..2500]));
}

#[test]
fn multichannel_matches_single_channel() {
    let a = sine(13.0, 1.0, 1000);
    let b = sine(5.0, 2.0, 1000);
    let mut data = Array2::<f64>::zeros((2, 1000));
    data.row_mut(0).assign(&ndarray::ArrayView1::from(&a));
    data.row_mut(1).assign(&ndarray::ArrayView1::from(&b));

    let h = design_bandpass(1.0, 30.0, SF, None, None);
    apply_fir_zero_phase(&mut data, &h).unwrap();
    let ya = filter_1d(&a, &h).unwrap();
    for (got, want) in data.row(0).iter().zip(&ya) {
        approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }
}

#[test]
fn even_taps_rejected() {
    assert!(filter_1d(&[1.0, 2.0, 3.0], &[0.5, 0.5]).is_err());
}

#[test]
fn empty_signal_passes_through() {
    let h = design_bandpass(12.0, 15.0, SF, Some(1.5), Some(1.5));
    assert!(filter_1d(&[], &h).unwrap().is_empty());
}
