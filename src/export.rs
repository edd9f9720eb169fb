use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::pairing::{FeatureValue, PairedMatch};

pub struct ExportReport {
    pub rows: usize,
    pub columns: usize,
}

/// Writes the paired feature table to a single-sheet workbook.
pub fn export_features(path: &Path, pairs: &[PairedMatch]) -> Result<ExportReport> {
    let columns = PairedMatch::column_names();

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("FixtureFeatures")?;
        for (col_idx, name) in columns.iter().enumerate() {
            sheet
                .write_string(0, col_idx as u16, name)
                .with_context(|| format!("write header {name}"))?;
        }
        for (row_idx, pair) in pairs.iter().enumerate() {
            write_row(sheet, row_idx as u32 + 1, &pair.values())?;
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rows: pairs.len(),
        columns: columns.len(),
    })
}

fn write_row(worksheet: &mut Worksheet, row_idx: u32, values: &[FeatureValue]) -> Result<()> {
    for (col_idx, value) in values.iter().enumerate() {
        let col = col_idx as u16;
        match value {
            FeatureValue::Text(s) => {
                worksheet.write_string(row_idx, col, s)?;
            }
            FeatureValue::Int(n) => {
                worksheet.write_number(row_idx, col, *n as f64)?;
            }
            FeatureValue::Float(f) => {
                worksheet.write_number(row_idx, col, *f)?;
            }
            FeatureValue::Null => {}
        }
    }
    Ok(())
}
