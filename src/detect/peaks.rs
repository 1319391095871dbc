//! Peak picking on short spindle segments.
//!
//! Mirrors `scipy.signal.find_peaks(x, distance=d, prominence=(None, None))`:
//! local maxima (flat tops resolved to their middle sample), thinned so that
//! no two survivors are closer than `d` samples (higher peaks win), each
//! annotated with its topographic prominence.

/// A local maximum and its prominence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub prominence: f64,
}

/// Local maxima of `x`, excluding the first and last sample.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a higher one.
fn select_by_distance(peaks: &[usize], x: &[f64], distance: f64) -> Vec<usize> {
    let d = distance.ceil().max(1.0) as usize;
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < d {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < d {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Prominence of the peak at `p`: its height above the higher of the two
/// lowest points reached before climbing past it on either side.
fn prominence(x: &[f64], p: usize) -> f64 {
    let h = x[p];
    let mut left_min = h;
    let mut i = p;
    loop {
        if x[i] > h {
            break;
        }
        left_min = left_min.min(x[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }
    let mut right_min = h;
    for &v in &x[p..] {
        if v > h {
            break;
        }
        right_min = right_min.min(v);
    }
    h - left_min.max(right_min)
}

/// Peaks of `x` at least `distance` samples apart, with prominences.
pub fn find_peaks(x: &[f64], distance: f64) -> Vec<Peak> {
    let maxima = local_maxima(x);
    select_by_distance(&maxima, x, distance)
        .into_iter()
        .map(|index| Peak { index, prominence: prominence(x, index) })
        .collect()
}

/// Remove the least-squares line from `y`.
pub fn detrend_linear(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let nf = n as f64;
    let mx = (nf - 1.0) / 2.0;
    let my = y.iter().sum::<f64>() / nf;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &v) in y.iter().enumerate() {
        let dx = i as f64 - mx;
        sxy += dx * (v - my);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    y.iter()
        .enumerate()
        .map(|(i, &v)| v - (my + slope * (i as f64 - mx)))
        .collect()
}

/// Peak-to-peak range.
pub fn ptp(x: &[f64]) -> f64 {
    let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if x.is_empty() { 0.0 } else { hi - lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn plateau_resolves_to_middle() {
        let x = [0.0, 1.0, 2.0, 2.0, 2.0, 1.0, 0.0];
        assert_eq!(local_maxima(&x), vec![3]);
    }

    #[test]
    fn edges_are_not_peaks() {
        assert!(local_maxima(&[5.0, 1.0, 0.0, 1.0, 5.0]).is_empty());
    }

    #[test]
    fn distance_keeps_higher_peak() {
        let x = [0.0, 3.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        let peaks: Vec<usize> = find_peaks(&x, 3.0).iter().map(|p| p.index).collect();
        assert_eq!(peaks, vec![3, 9]);
    }

    #[test]
    fn prominence_uses_higher_base() {
        let x = [0.0, 2.0, 1.0, 4.0, 3.0, 3.5, -1.0];
        let peaks = find_peaks(&x, 1.0);
        let at = |i: usize| peaks.iter().find(|p| p.index == i).unwrap().prominence;
        assert_abs_diff_eq!(at(3), 4.0 - 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at(1), 2.0 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at(5), 3.5 - 3.0, epsilon = 1e-12);
    }

    #[test]
    fn tone_peak_count() {
        // 1 s of 13 Hz at 200 Hz → 13 maxima, 60 ms (12 samples) apart is safe.
        let x: Vec<f64> = (0..200)
            .map(|i| (2.0 * std::f64::consts::PI * 13.0 * i as f64 / 200.0).sin())
            .collect();
        assert_eq!(find_peaks(&x, 12.0).len(), 13);
    }

    #[test]
    fn detrend_removes_line() {
        let y: Vec<f64> = (0..50).map(|i| 3.0 + 0.5 * i as f64).collect();
        for v in detrend_linear(&y) {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(ptp(&[1.0, -2.0, 4.0]), 6.0);
    }
}
