//! Per-group summary statistics of a spindle event table.
//!
//! ```text
//!  events ─► group by (Stage?, Channel?) ─► Count │ Density? │ agg(Duration … Symmetry) ─► round 3
//! ```
//!
//! Groups are sorted ascending, stage before channel. Density (spindles per
//! minute of the stage) only exists for stage grouping on a staged run.
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};

use crate::detect::{Spindle, SpindleEvents};

/// Aggregated event features, in output order.
pub const VALUE_COLUMNS: [&str; 8] = [
    "Duration",
    "Amplitude",
    "RMS",
    "AbsPower",
    "RelPower",
    "Frequency",
    "Oscillations",
    "Symmetry",
];

/// Decimals kept in every summary value.
pub const ROUND_DECIMALS: i32 = 3;

/// How the per-event features of a group are reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregate {
    #[default]
    Mean,
    Median,
}

/// One group key component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexValue {
    Stage(u8),
    Channel(String),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Stage(s) => write!(f, "{s}"),
            IndexValue::Channel(c) => f.write_str(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub index: Vec<IndexValue>,
    pub values: Vec<f64>,
}

/// A grouped summary: index columns, value columns, one row per group.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub index_names: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Number of data rows (header excluded).
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row: index names followed by value column names.
    pub fn header(&self) -> Vec<&str> {
        self.index_names
            .iter()
            .chain(self.columns.iter())
            .map(String::as_str)
            .collect()
    }

    /// All values of one value column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.values[j]).collect())
    }
}

impl SpindleEvents {
    /// Summarise the events by channel, by stage, or by both.
    pub fn summary(&self, grp_chan: bool, grp_stage: bool, agg: Aggregate) -> Result<SummaryTable> {
        if !grp_chan && !grp_stage {
            bail!("summary needs at least one grouping (channel or stage)");
        }
        if grp_stage && self.hypno.is_none() {
            bail!("cannot group by stage: events were detected without a hypnogram");
        }

        let mut groups: BTreeMap<Vec<IndexValue>, Vec<&Spindle>> = BTreeMap::new();
        for ev in &self.events {
            let mut key = Vec::with_capacity(2);
            if grp_stage {
                match ev.stage {
                    Some(s) => key.push(IndexValue::Stage(s)),
                    None => bail!("event at {:.3} s on {} has no stage", ev.start, ev.channel),
                }
            }
            if grp_chan {
                key.push(IndexValue::Channel(ev.channel.clone()));
            }
            groups.entry(key).or_default().push(ev);
        }

        let stage_minutes = match (&self.hypno, grp_stage) {
            (Some(h), true) => Some(minutes_per_stage(h, self.sfreq)),
            _ => None,
        };

        let mut index_names = Vec::new();
        if grp_stage {
            index_names.push("Stage".to_string());
        }
        if grp_chan {
            index_names.push("Channel".to_string());
        }
        let mut columns = vec!["Count".to_string()];
        if stage_minutes.is_some() {
            columns.push("Density".to_string());
        }
        columns.extend(VALUE_COLUMNS.iter().map(|c| c.to_string()));

        let rows = groups
            .into_iter()
            .map(|(index, members)| {
                let count = members.len() as f64;
                let mut values = vec![count];
                if let Some(minutes) = &stage_minutes {
                    let density = match index.first() {
                        Some(IndexValue::Stage(s)) => match minutes.get(s) {
                            Some(&m) if m > 0.0 => count / m,
                            _ => f64::NAN,
                        },
                        _ => f64::NAN,
                    };
                    values.push(density);
                }
                for name in VALUE_COLUMNS {
                    let xs: Vec<f64> = members.iter().map(|e| feature(e, name)).collect();
                    values.push(reduce(&xs, agg));
                }
                values.iter_mut().for_each(|v| *v = round_to(*v, ROUND_DECIMALS));
                SummaryRow { index, values }
            })
            .collect();

        Ok(SummaryTable { index_names, columns, rows })
    }
}

fn feature(e: &Spindle, name: &str) -> f64 {
    match name {
        "Duration" => e.duration,
        "Amplitude" => e.amplitude,
        "RMS" => e.rms,
        "AbsPower" => e.abs_power,
        "RelPower" => e.rel_power,
        "Frequency" => e.frequency,
        "Oscillations" => e.oscillations as f64,
        "Symmetry" => e.symmetry,
        _ => f64::NAN,
    }
}

/// Minutes spent in each stage code of a dense hypnogram.
pub fn minutes_per_stage(hypno: &[u8], sfreq: f64) -> BTreeMap<u8, f64> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for &c in hypno {
        *counts.entry(c).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(c, n)| (c, n as f64 / sfreq / 60.0))
        .collect()
}

/// Mean or median over the non-NaN values; NaN when none are left.
fn reduce(xs: &[f64], agg: Aggregate) -> f64 {
    let valid: Vec<f64> = xs.iter().copied().filter(|v| !v.is_nan()).collect();
    match agg {
        Aggregate::Mean => crate::detect::moving::mean(&valid),
        Aggregate::Median => crate::detect::moving::median(&valid),
    }
}

/// Round half to even at `decimals` places.
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round_ties_even() / scale
}
