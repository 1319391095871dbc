//! Sleep-stage labels: symbol mapping, scoring-file reader and alignment.
//!
//! A scoring file holds one label per 30 s epoch in the first column of its
//! first sheet, under a single header row. Labels come from a small closed
//! vocabulary ([`STAGE_MAP`]); anything else aborts the file.
//!
//! [`upsample_to_data`] then repeats each epoch label over the samples it
//! covers, so the detector sees one stage code per signal sample:
//!
//! ```text
//! sparse  [ W        | 2        | 2        | R       ]   1/30 Hz
//! dense   [ 0 0 … 0  | 2 2 … 2  | 2 2 … 2  | 4 4 … 4 ]   sfreq, len = n_samples
//! ```
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;

/// Canonical sleep stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    Wake = 0,
    N1 = 1,
    N2 = 2,
    N3 = 3,
    Rem = 4,
}

/// Every symbol a scoring file may use, with its canonical stage.
///
/// Numeric symbols match numeric cells (`2`, `2.0`) as well as numeric text.
pub const STAGE_MAP: [(&str, Stage); 7] = [
    ("W", Stage::Wake),
    ("0", Stage::Wake),
    ("1", Stage::N1),
    ("2", Stage::N2),
    ("3", Stage::N3),
    ("R", Stage::Rem),
    ("4", Stage::Rem),
];

impl Stage {
    pub const ALL: [Stage; 5] = [Stage::Wake, Stage::N1, Stage::N2, Stage::N3, Stage::Rem];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look a textual symbol up in [`STAGE_MAP`] (exact, case-sensitive).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        STAGE_MAP
            .iter()
            .find(|(key, _)| *key == symbol)
            .map(|&(_, stage)| stage)
    }

    /// Map one spreadsheet cell.
    pub fn from_cell(cell: &Data) -> Option<Self> {
        match cell {
            Data::String(s) => Self::from_symbol(s.trim()),
            Data::Int(i) => u8::try_from(*i).ok().and_then(Self::from_symbol_code),
            Data::Float(f) if f.fract() == 0.0 && (0.0..=255.0).contains(f) => {
                Self::from_symbol_code(*f as u8)
            }
            _ => None,
        }
    }

    /// Numeric alias lookup; routed through the table so the map stays the
    /// single source of truth.
    fn from_symbol_code(code: u8) -> Option<Self> {
        Self::from_symbol(&code.to_string())
    }
}

/// Contract failures of the label pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HypnoError {
    #[error("sleep stage mapping not found for {value} (row {row})")]
    UnknownStage { row: usize, value: String },
    #[error("hypnogram has no epochs")]
    EmptyHypnogram,
    #[error("hypnogram rate {sf_hypno} Hz must not exceed data rate {sf_data} Hz")]
    RateMismatch { sf_hypno: f64, sf_data: f64 },
    #[error("data rate {sf_data} Hz is not a whole multiple of hypnogram rate {sf_hypno} Hz")]
    NotWholeRatio { sf_hypno: f64, sf_data: f64 },
}

/// Map one cell, reporting its 1-based sheet row on failure.
pub fn map_stage(cell: &Data, row: usize) -> Result<Stage, HypnoError> {
    Stage::from_cell(cell).ok_or_else(|| HypnoError::UnknownStage {
        row,
        value: describe(cell),
    })
}

/// Per-epoch stage labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypnogram {
    pub stages: Vec<Stage>,
}

impl Hypnogram {
    /// Map a column of cells; `first_row` is the sheet row of `cells[0]`.
    pub fn from_cells<'a, I>(cells: I, first_row: usize) -> Result<Self, HypnoError>
    where
        I: IntoIterator<Item = &'a Data>,
    {
        let stages = cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| map_stage(cell, first_row + i))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err(HypnoError::EmptyHypnogram);
        }
        Ok(Self { stages })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn codes(&self) -> Vec<u8> {
        self.stages.iter().map(|s| s.code()).collect()
    }
}

/// Read the first column of the first sheet of a scoring workbook
/// (`.ods`, `.xlsx`, `.xls`), skipping `header_rows` leading rows.
pub fn read_hypnogram<P: AsRef<Path>>(path: P, header_rows: usize) -> Result<Hypnogram> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("open scoring file {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("scoring file {} has no sheets", path.display()))?
        .with_context(|| format!("read first sheet of {}", path.display()))?;

    let top = range.start().map_or(0, |(row, _)| row as usize);
    let column: Vec<&Data> = range
        .rows()
        .skip(header_rows)
        .map(|row| row.first().unwrap_or(&Data::Empty))
        .collect();
    let hypno = Hypnogram::from_cells(column, top + header_rows + 1)?;
    log::debug!("read {} epochs from {}", hypno.len(), path.display());
    Ok(hypno)
}

/// Upsample per-epoch codes to one code per data sample.
///
/// Each code is repeated `sf_data / sf_hypno` times (must be a whole number),
/// then the result is padded with its last value or cropped to `n_samples`.
pub fn upsample_to_data(
    codes: &[u8],
    sf_hypno: f64,
    sf_data: f64,
    n_samples: usize,
) -> Result<Vec<u8>, HypnoError> {
    if codes.is_empty() {
        return Err(HypnoError::EmptyHypnogram);
    }
    if sf_hypno > sf_data {
        return Err(HypnoError::RateMismatch { sf_hypno, sf_data });
    }
    let ratio = sf_data / sf_hypno;
    let repeats = ratio.round();
    if (ratio - repeats).abs() > 1e-6 * ratio.max(1.0) {
        return Err(HypnoError::NotWholeRatio { sf_hypno, sf_data });
    }
    let repeats = repeats as usize;

    let mut dense: Vec<u8> = codes
        .iter()
        .flat_map(|&c| std::iter::repeat(c).take(repeats))
        .collect();

    let n_hyp = dense.len();
    if n_hyp < n_samples {
        log::warn!(
            "hypnogram is SHORTER than data by {:.2} seconds; padding with last value",
            (n_samples - n_hyp) as f64 / sf_data
        );
        let last = codes[codes.len() - 1];
        dense.resize(n_samples, last);
    } else if n_hyp > n_samples {
        log::warn!(
            "hypnogram is LONGER than data by {:.2} seconds; cropping",
            (n_hyp - n_samples) as f64 / sf_data
        );
        dense.truncate(n_samples);
    }
    Ok(dense)
}

/// Nearest-index relabelling of a dense hypnogram onto a new sample grid.
pub fn resample_labels(dense: &[u8], sf_old: f64, sf_new: f64, n_new: usize) -> Vec<u8> {
    if dense.is_empty() {
        return vec![];
    }
    let step = sf_old / sf_new;
    (0..n_new)
        .map(|i| {
            let j = ((i as f64 * step).round() as usize).min(dense.len() - 1);
            dense[j]
        })
        .collect()
}

fn describe(cell: &Data) -> String {
    match cell {
        Data::String(s) => format!("{s:?}"),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => "<empty cell>".to_string(),
        other => format!("{other:?}"),
    }
}
