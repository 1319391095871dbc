mod common;
use approx::assert_abs_diff_eq;
use edfplus::{EdfWriter, SignalParam};
use std::f64::consts::PI;
use std::path::Path;

use spindlestats::read_edf;

fn signal(label: &str, spr: i32, lo: f64, hi: f64, unit: &str) -> SignalParam {
    SignalParam {
        label: label.into(),
        samples_in_file: 0,
        physical_max: hi,
        physical_min: lo,
        digital_max: 32767,
        digital_min: -32768,
        samples_per_record: spr,
        physical_dimension: unit.into(),
        prefilter: String::new(),
        transducer: String::new(),
    }
}

/// 10 one-second records: C3 at 256 Hz (µV), SpO2 at 1 Hz, Fz at 128 Hz (mV).
fn write_polysomnography(path: &Path) {
    let mut w = EdfWriter::create(path).unwrap();
    w.set_datarecord_duration(1.0).unwrap();
    w.add_signal(signal("C3", 256, -100.0, 100.0, "uV")).unwrap();
    w.add_signal(signal("SpO2", 1, 0.0, 100.0, "%")).unwrap();
    w.add_signal(signal("Fz", 128, -1.0, 1.0, "mV")).unwrap();
    for r in 0..10 {
        let c3 = (0..256)
            .map(|k| 50.0 * (2.0 * PI * 12.0 * (r * 256 + k) as f64 / 256.0).sin())
            .collect();
        let fz = vec![0.02; 128];
        w.write_samples(&[c3, vec![96.0], fz]).unwrap();
    }
    w.finalize().unwrap();
}

#[test]
fn mixed_rate_channels_share_the_fastest_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psg.edf");
    write_polysomnography(&path);

    let rec = read_edf(&path).unwrap();
    assert_eq!(rec.ch_names, vec!["C3", "SpO2", "Fz"]);
    assert_abs_diff_eq!(rec.sfreq, 256.0, epsilon = 1e-9);
    assert_eq!(rec.data.dim(), (3, 2560));
    assert_abs_diff_eq!(rec.duration_secs(), 10.0, epsilon = 1e-9);

    // The full-rate channel is untouched apart from quantisation.
    let t = 300;
    let expect = 50.0 * (2.0 * PI * 12.0 * t as f64 / 256.0).sin();
    assert_abs_diff_eq!(rec.data[[0, t]], expect, epsilon = 0.01);

    // Constant slow channels survive resampling; Fz is scaled mV → µV.
    for &v in rec.data.row(1).iter().step_by(97) {
        assert_abs_diff_eq!(v, 96.0, epsilon = 0.05);
    }
    for &v in rec.data.row(2).iter().step_by(97) {
        assert_abs_diff_eq!(v, 20.0, epsilon = 0.1);
    }
}

#[test]
fn annotation_signal_is_not_a_channel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annot.edf");
    common::write_recording(&path, 2, 1);

    let rec = read_edf(&path).unwrap();
    assert_eq!(rec.ch_names, common::channel_names(2));
    assert!(rec.ch_names.iter().all(|c| c != "EDF Annotations"));
    assert_abs_diff_eq!(rec.sfreq, common::SFREQ, epsilon = 1e-9);
}

#[test]
fn truncated_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.edf");
    std::fs::write(&path, b"0       garbage").unwrap();
    assert!(read_edf(&path).is_err());
}
