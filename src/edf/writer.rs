//! EDF+ writer on top of `edfplus::EdfWriter`.
//!
//! Writes 1-second data records. Each channel gets its own whole-µV
//! physical range, widened outward from the channel's min/max, so the
//! 16-bit quantisation step stays small.
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use edfplus::{EdfWriter, SignalParam};
use ndarray::{Array2, ArrayView1};

const DIGITAL_MIN: i32 = -32768;
const DIGITAL_MAX: i32 = 32767;

/// Whole-µV physical range enclosing `row`, at least 1 µV wide.
fn physical_range(row: ArrayView1<f64>) -> (f64, f64) {
    let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let (lo, hi) = (lo.min(0.0).floor(), hi.max(0.0).ceil());
    if hi - lo < 1.0 { (lo - 1.0, hi + 1.0) } else { (lo, hi) }
}

/// Write `data` (`[n_chan, n_times]`, µV) as an EDF+ file.
///
/// `sfreq` must be a whole number of Hz. A trailing partial record is
/// zero-filled.
pub fn write_edf<P: AsRef<Path>>(
    path: P,
    ch_names: &[String],
    sfreq: f64,
    data: &Array2<f64>,
) -> Result<()> {
    let path = path.as_ref();
    let (n_chan, n_times) = data.dim();
    if n_chan != ch_names.len() {
        bail!("{} channel names for {} channels", ch_names.len(), n_chan);
    }
    if sfreq <= 0.0 || sfreq.fract() != 0.0 {
        bail!("EDF writer needs a whole-Hz sampling rate, got {sfreq}");
    }
    let spr = sfreq as usize;
    let n_records = n_times.div_ceil(spr);

    let edf_err = |what: &str, e: edfplus::EdfError| anyhow!("{what} {}: {e:?}", path.display());

    let mut writer = EdfWriter::create(path).map_err(|e| edf_err("create", e))?;
    writer
        .set_datarecord_duration(1.0)
        .map_err(|e| edf_err("set record duration of", e))?;
    for (name, row) in ch_names.iter().zip(data.rows()) {
        let (physical_min, physical_max) = physical_range(row);
        writer
            .add_signal(SignalParam {
                label: name.clone(),
                samples_in_file: 0,
                physical_max,
                physical_min,
                digital_max: DIGITAL_MAX,
                digital_min: DIGITAL_MIN,
                samples_per_record: spr as i32,
                physical_dimension: "uV".to_string(),
                prefilter: String::new(),
                transducer: String::new(),
            })
            .map_err(|e| edf_err("add signal to", e))?;
    }

    for r in 0..n_records {
        let start = r * spr;
        let record: Vec<Vec<f64>> = data
            .rows()
            .into_iter()
            .map(|row| {
                (start..start + spr)
                    .map(|t| if t < n_times { row[t] } else { 0.0 })
                    .collect()
            })
            .collect();
        writer
            .write_samples(&record)
            .map_err(|e| edf_err("write record to", e))?;
    }
    writer.finalize().map_err(|e| edf_err("finalize", e))?;
    log::debug!("wrote {n_records} record(s) x {n_chan} channel(s) to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn range_is_whole_and_encloses_data() {
        assert_eq!(physical_range(arr1(&[-12.3, 40.2]).view()), (-13.0, 41.0));
        assert_eq!(physical_range(arr1(&[5.0, 7.5]).view()), (0.0, 8.0));
    }

    #[test]
    fn flat_channel_gets_nonzero_range() {
        assert_eq!(physical_range(arr1(&[0.0, 0.0]).view()), (-1.0, 1.0));
    }

    #[test]
    fn rejects_fractional_rate() {
        let data = Array2::<f64>::zeros((1, 10));
        let dir = tempfile::tempdir().unwrap();
        assert!(write_edf(dir.path().join("x.edf"), &["A".into()], 99.5, &data).is_err());
    }

    #[test]
    fn rejects_name_count_mismatch() {
        let data = Array2::<f64>::zeros((2, 10));
        let dir = tempfile::tempdir().unwrap();
        assert!(write_edf(dir.path().join("x.edf"), &["A".into()], 10.0, &data).is_err());
    }
}
