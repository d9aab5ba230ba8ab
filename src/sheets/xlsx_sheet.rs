//! Read-only workbook input (`.xlsx`, `.xlsm`, `.xls`, `.ods`)

use calamine::{open_workbook_auto, Data, Reader};
use std::path::PathBuf;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Row;

#[derive(Debug, Clone)]
pub struct XlsxSheet {
    path: PathBuf,
    worksheet: Option<String>,
}

impl XlsxSheet {
    pub fn new(path: PathBuf, worksheet: Option<String>) -> Self {
        Self { path, worksheet }
    }

    pub fn describe(&self) -> String {
        match &self.worksheet {
            Some(ws) => format!("{}#{}", self.path.display(), ws),
            None => self.path.display().to_string(),
        }
    }

    /// Rows of the named worksheet, or of the first one
    pub async fn read_rows(&self) -> AppResult<Vec<Row>> {
        let path = self.path.clone();
        let worksheet = self.worksheet.clone();
        tokio::task::spawn_blocking(move || read_workbook(&path, worksheet.as_deref()))
            .await
            .map_err(|e| AppError::unhandled(format!("workbook reader task failed: {}", e)))?
    }
}

fn read_workbook(path: &std::path::Path, worksheet: Option<&str>) -> AppResult<Vec<Row>> {
    let mut workbook = open_workbook_auto(path)?;

    let name = match worksheet {
        Some(name) => name.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            AppError::new(
                ErrorCode::SheetFormat,
                format!("{} has no worksheets", path.display()),
            )
        })?,
    };

    let range = workbook.worksheet_range(&name)?;
    Ok(range
        .rows()
        .map(|cells| cells.iter().map(cell_text).collect())
        .collect())
}

/// Whole-number floats print without a fractional part; registration numbers
/// typed into Excel are stored as floats.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
