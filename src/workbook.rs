//! Output workbook: title sheet plus one sheet per subject.
//!
//! A subject sheet stacks its summary tables vertically:
//!
//! ```text
//! row 0            ┌ header ─ Stage │ Channel │ Count │ Density │ …
//!                  │ S1 rows
//! len(S1)+5        ├ header ─ Stage │ Count │ Density │ …
//!                  │ S2 rows
//! start(S2)+len+5  ├ header ─ Channel │ Count │ …
//!                  └ S3 rows
//! ```
//!
//! `.xlsx` cannot be patched in place, so every write reads the existing
//! sheets back (cell values only), then saves a fresh workbook with the
//! subject sheet replaced or appended.
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::summary::{IndexValue, SummaryTable};

pub const TITLE_SHEET: &str = "Title";
pub const TITLE_HEADER: &str = "Info";
pub const TITLE_ROWS: [&str; 2] = ["Author: Sleep Lab", "Spindle Density Tables"];

/// Row distance from the start of one table to the header of the next,
/// counted past the previous table's data rows.
pub const TABLE_GAP_ROWS: u32 = 5;

/// Result of one subject write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// The subject sheet existed and was overwritten.
    pub replaced: bool,
    /// Header row of each table.
    pub offsets: Vec<u32>,
}

/// Create `path` with only the title sheet, unless it already exists.
///
/// Returns `true` when the file was created.
pub fn ensure_workbook<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(TITLE_SHEET)?;
    sheet.write_string(0, 0, TITLE_HEADER)?;
    for (r, text) in TITLE_ROWS.iter().enumerate() {
        sheet.write_string(r as u32 + 1, 0, *text)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("create workbook {}", path.display()))?;
    log::info!("created workbook {}", path.display());
    Ok(true)
}

/// Header rows of stacked tables with `lens` data rows each.
pub fn table_offsets(lens: &[usize]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(lens.len());
    let mut row = 0u32;
    for &len in lens {
        offsets.push(row);
        row += len as u32 + TABLE_GAP_ROWS;
    }
    offsets
}

/// Write `tables` onto sheet `sheet_name` of the workbook at `path`.
///
/// An existing sheet of that name, compared ASCII case-insensitively as
/// spreadsheet applications do, is replaced at its position and renamed to
/// `sheet_name`. Every other sheet keeps its cell values and order.
pub fn write_subject_tables<P: AsRef<Path>>(
    path: P,
    sheet_name: &str,
    tables: &[&SummaryTable],
) -> Result<WriteReport> {
    let path = path.as_ref();
    let existing = read_sheets(path)?;
    let replaced = existing.iter().any(|s| s.name.eq_ignore_ascii_case(sheet_name));
    if replaced {
        log::info!("sheet {sheet_name} already exists in {}; overriding", path.display());
    }

    let lens: Vec<usize> = tables.iter().map(|t| t.len()).collect();
    let offsets = table_offsets(&lens);

    let mut workbook = Workbook::new();
    for sheet in &existing {
        let ws = workbook.add_worksheet();
        if sheet.name.eq_ignore_ascii_case(sheet_name) {
            ws.set_name(sheet_name)
                .with_context(|| format!("invalid sheet name {sheet_name:?}"))?;
            write_tables(ws, tables, &offsets)?;
        } else {
            ws.set_name(&sheet.name)?;
            sheet.copy_into(ws)?;
        }
    }
    if !replaced {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet_name)
            .with_context(|| format!("invalid sheet name {sheet_name:?}"))?;
        write_tables(ws, tables, &offsets)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;

    Ok(WriteReport { replaced, offsets })
}

fn write_tables(ws: &mut Worksheet, tables: &[&SummaryTable], offsets: &[u32]) -> Result<()> {
    for (table, &top) in tables.iter().zip(offsets) {
        for (c, name) in table.header().into_iter().enumerate() {
            ws.write_string(top, c as u16, name)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = top + 1 + r as u32;
            for (c, key) in row.index.iter().enumerate() {
                match key {
                    IndexValue::Stage(s) => ws.write_number(r, c as u16, f64::from(*s))?,
                    IndexValue::Channel(name) => ws.write_string(r, c as u16, name)?,
                };
            }
            let first = row.index.len();
            for (j, &v) in row.values.iter().enumerate() {
                if v.is_finite() {
                    ws.write_number(r, (first + j) as u16, v)?;
                }
            }
        }
    }
    Ok(())
}

// ── Carry-over of existing sheets ───────────────────────────────────────────

enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

struct SheetCells {
    name: String,
    cells: Vec<(u32, u16, CellValue)>,
}

impl SheetCells {
    fn copy_into(&self, ws: &mut Worksheet) -> Result<()> {
        for (r, c, v) in &self.cells {
            match v {
                CellValue::Text(s) => ws.write_string(*r, *c, s)?,
                CellValue::Number(x) => ws.write_number(*r, *c, *x)?,
                CellValue::Bool(b) => ws.write_boolean(*r, *c, *b)?,
            };
        }
        Ok(())
    }
}

fn read_sheets(path: &Path) -> Result<Vec<SheetCells>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("open workbook {}", path.display()))?;
    let mut out = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("read sheet {name} of {}", path.display()))?;
        let (r0, c0) = range.start().unwrap_or((0, 0));
        let cells = range
            .used_cells()
            .filter_map(|(r, c, v)| {
                let value = match v {
                    Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                        CellValue::Text(s.clone())
                    }
                    Data::Float(x) => CellValue::Number(*x),
                    Data::Int(i) => CellValue::Number(*i as f64),
                    Data::Bool(b) => CellValue::Bool(*b),
                    Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
                    Data::Error(_) | Data::Empty => return None,
                };
                Some((r0 + r as u32, (c0 + c as u32) as u16, value))
            })
            .collect();
        out.push(SheetCells { name, cells });
    }
    Ok(out)
}
