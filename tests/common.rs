/// Shared helpers: synthetic spindle recordings and scoring workbooks.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

use spindlestats::{write_edf, BatchConfig};

pub const SFREQ: f64 = 100.0;
/// Four 30 s epochs.
pub const DURATION_SECS: f64 = 120.0;
/// One 1 s, 13 Hz burst every 10 s starting at 5 s.
pub const BURST_ONSETS: [f64; 12] = [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0, 105.0, 115.0];
pub const BURST_SECS: f64 = 1.0;
pub const BURST_FREQ: f64 = 13.0;
pub const BURST_AMP: f64 = 40.0;
/// Uniform background noise half-range (µV).
pub const NOISE_AMP: f64 = 10.0;
/// Scoring of the four epochs: W, N2, N2, N3.
pub const SCORES: [&str; 4] = ["W", "2", "2", "3"];
/// LibreOffice-style scoring of [`SCORES`]; the two N2 rows are stored as
/// one `table:number-rows-repeated="2"` run.
pub const ODS_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/subj1_ODS.ods");

#[allow(unused)]
pub fn channel_names(n: usize) -> Vec<String> {
    ["C3", "C4", "F3", "F4", "O1", "O2"].iter().take(n).map(|s| s.to_string()).collect()
}

#[allow(unused)]
/// `[n_chan, DURATION_SECS · SFREQ]` µV: uniform noise plus sigma bursts.
pub fn synth_spindles(n_chan: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (DURATION_SECS * SFREQ) as usize;
    let mut data = Array2::<f64>::zeros((n_chan, n));
    for c in 0..n_chan {
        for t in 0..n {
            let secs = t as f64 / SFREQ;
            let mut v = rng.gen_range(-NOISE_AMP..NOISE_AMP);
            if BURST_ONSETS.iter().any(|&on| secs >= on && secs < on + BURST_SECS) {
                v += BURST_AMP * (2.0 * PI * BURST_FREQ * secs).sin();
            }
            data[[c, t]] = v;
        }
    }
    data
}

#[allow(unused)]
/// Write a synthetic recording as EDF.
pub fn write_recording(path: &Path, n_chan: usize, seed: u64) {
    let data = synth_spindles(n_chan, seed);
    write_edf(path, &channel_names(n_chan), SFREQ, &data).unwrap();
}

#[allow(unused)]
/// Write a scoring workbook: header `Stage`, then one label per row.
/// Labels that parse as numbers are stored as numeric cells.
pub fn write_scoring(path: &Path, labels: &[&str]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Stage").unwrap();
    for (i, label) in labels.iter().enumerate() {
        let row = i as u32 + 1;
        match label.parse::<f64>() {
            Ok(v) => sheet.write_number(row, 0, v).unwrap(),
            Err(_) => sheet.write_string(row, 0, *label).unwrap(),
        };
    }
    workbook.save(path).unwrap();
}

#[allow(unused)]
/// Batch layout rooted at `dir` with `.xlsx` scoring files; creates both
/// input directories.
pub fn batch_layout(dir: &Path) -> BatchConfig {
    let cfg = BatchConfig {
        scoring_suffix: "_ODS.xlsx".into(),
        ..BatchConfig::default()
    }
    .rooted_at(dir);
    std::fs::create_dir_all(&cfg.archive_dir).unwrap();
    std::fs::create_dir_all(&cfg.scoring_dir).unwrap();
    cfg
}

#[allow(unused)]
/// Add subject `stem` (recording + scoring) to a batch layout.
pub fn add_subject(cfg: &BatchConfig, stem: &str, labels: &[&str], seed: u64) {
    let name = format!("{stem}.edf");
    write_recording(&cfg.recording_path(&name), 2, seed);
    write_scoring(&cfg.scoring_path_for(&name), labels);
}

#[allow(unused)]
/// All cell values of `sheet` as strings, keyed by absolute (row, col).
pub fn sheet_cells(path: &Path, sheet: &str) -> std::collections::BTreeMap<(u32, u32), String> {
    use calamine::{open_workbook_auto, Data, Reader};
    let mut wb = open_workbook_auto(path).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    let (r0, c0) = range.start().unwrap_or((0, 0));
    range
        .used_cells()
        .filter_map(|(r, c, v)| {
            let s = match v {
                Data::String(s) => s.clone(),
                Data::Float(f) => f.to_string(),
                Data::Int(i) => i.to_string(),
                Data::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some(((r0 + r as u32, c0 + c as u32), s))
        })
        .collect()
}

#[allow(unused)]
pub fn sheet_names(path: &Path) -> Vec<String> {
    use calamine::{open_workbook_auto, Reader};
    open_workbook_auto(path).unwrap().sheet_names()
}
