//! Sliding-window statistics and the small numeric helpers around them.
//!
//! Windows are centred on `k · step` seconds and clipped at both signal ends:
//!
//! ```text
//! beg_k = max(0,     ⌊(k·step − window/2) · sf⌋)
//! end_k = min(n − 1, ⌊(k·step + window/2) · sf⌋)
//! t_k   = (beg_k + end_k) / 2 / sf
//! ```
//!
//! The per-window values are then linearly interpolated back to one value
//! per sample, zero outside `[t_0, t_last]`.

/// Statistic computed over each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingStat {
    /// Pearson correlation between the two inputs.
    Corr,
    /// Root mean square of the first input.
    Rms,
}

/// Sliding `stat` over `x` (and `y` for [`MovingStat::Corr`]), interpolated
/// to `x.len()` samples.
pub fn moving_transform(x: &[f64], y: &[f64], sf: f64, window: f64, step: f64, stat: MovingStat) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }
    let half = window / 2.0;
    let last = (n - 1) as f64;
    let total = n as f64 / sf;

    let n_win = (total / step).ceil() as usize;
    let mut times = Vec::with_capacity(n_win);
    let mut values = Vec::with_capacity(n_win);
    for k in 0..n_win {
        let centre = k as f64 * step;
        let beg = ((centre - half) * sf).trunc().max(0.0) as usize;
        let end = ((centre + half) * sf).trunc().min(last) as usize;
        times.push((beg + end) as f64 / 2.0 / sf);
        let v = match stat {
            MovingStat::Corr => pearson(&x[beg..end.max(beg)], &y[beg..end.max(beg)]),
            MovingStat::Rms => rms(&x[beg..end.max(beg)]),
        };
        values.push(v);
    }

    let grid: Vec<f64> = (0..n).map(|i| i as f64 / sf).collect();
    interp_linear(&times, &values, &grid)
}

/// Pearson correlation; zero when either input is constant or empty.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let den = (sxx * syy).sqrt();
    if den > 0.0 { sxy / den } else { 0.0 }
}

pub fn rms(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Median; NaN for an empty slice.
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut v = x.to_vec();
    v.sort_by(f64::total_cmp);
    let m = v.len() / 2;
    if v.len() % 2 == 1 { v[m] } else { 0.5 * (v[m - 1] + v[m]) }
}

/// Sample standard deviation after cutting `cut` of the sorted values at
/// each end (`ddof = 1`).
pub fn trimbothstd(x: &[f64], cut: f64) -> f64 {
    let mut v = x.to_vec();
    v.sort_by(f64::total_cmp);
    let low = (cut * v.len() as f64) as usize;
    let high = v.len().saturating_sub(low);
    let kept = &v[low.min(high)..high];
    if kept.len() < 2 {
        return f64::NAN;
    }
    let m = mean(kept);
    let ss: f64 = kept.iter().map(|a| (a - m) * (a - m)).sum();
    (ss / (kept.len() - 1) as f64).sqrt()
}

/// Linear interpolation of `(xp, fp)` at `x`; zero outside `[xp₀, xp_last]`.
///
/// `xp` must be increasing, `x` non-decreasing.
pub fn interp_linear(xp: &[f64], fp: &[f64], x: &[f64]) -> Vec<f64> {
    if xp.is_empty() {
        return vec![0.0; x.len()];
    }
    let (first, last) = (xp[0], xp[xp.len() - 1]);
    let mut j = 0usize;
    x.iter()
        .map(|&xi| {
            if xi < first || xi > last {
                return 0.0;
            }
            while j + 1 < xp.len() && xp[j + 1] < xi {
                j += 1;
            }
            if j + 1 == xp.len() {
                return fp[j];
            }
            let (x0, x1) = (xp[j], xp[j + 1]);
            let w = if x1 > x0 { (xi - x0) / (x1 - x0) } else { 0.0 };
            fp[j] + w * (fp[j + 1] - fp[j])
        })
        .collect()
}
