//! Sheets Module - Spreadsheet backends
//!
//! Three backends share one row model (`Vec<String>`, header first):
//! - local CSV files (read + append)
//! - local workbooks `.xlsx/.xlsm/.xls/.ods` (read only)
//! - Google Sheets worksheets via the v4 REST API (read + append)
//!
//! A location string picks the backend:
//! - `gsheet:<spreadsheet_id>/<worksheet>`
//! - `path/to/book.xlsx` or `path/to/book.xlsx#Worksheet`
//! - anything else is a CSV path

pub mod csv_sheet;
pub mod google;
pub mod xlsx_sheet;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::Row;
use crate::utils::constants::GSHEET_SCHEME;

pub use csv_sheet::CsvSheet;
pub use google::{GoogleSheet, GoogleSheetsClient};
pub use xlsx_sheet::XlsxSheet;

/// Anything rows can be appended to
pub trait SheetSink {
    fn append_rows(&self, rows: &[Row]) -> impl Future<Output = AppResult<()>> + Send;
}

impl<T: SheetSink + Sync> SheetSink for &T {
    fn append_rows(&self, rows: &[Row]) -> impl Future<Output = AppResult<()>> + Send {
        (**self).append_rows(rows)
    }
}

/// Identifier column selector: header text or 1-based column index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputColumn {
    Index(usize),
    Name(String),
}

impl FromStr for InputColumn {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<usize>() {
            Ok(i) => InputColumn::Index(i),
            Err(_) => InputColumn::Name(s.trim().to_string()),
        })
    }
}

impl fmt::Display for InputColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputColumn::Index(i) => write!(f, "#{}", i),
            InputColumn::Name(n) => write!(f, "'{}'", n),
        }
    }
}

/// Parsed location string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetLocation {
    Csv(PathBuf),
    Workbook {
        path: PathBuf,
        worksheet: Option<String>,
    },
    Google {
        spreadsheet_id: String,
        worksheet: String,
    },
}

const WORKBOOK_EXTENSIONS: [&str; 4] = [".xlsx", ".xlsm", ".xls", ".ods"];

fn is_workbook_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    WORKBOOK_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

impl FromStr for SheetLocation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AppError::invalid_config("Empty sheet location"));
        }

        if let Some(rest) = s.strip_prefix(GSHEET_SCHEME) {
            let (id, worksheet) = rest.split_once('/').ok_or_else(|| {
                AppError::invalid_config(format!(
                    "Expected {}<spreadsheet_id>/<worksheet>, got '{}'",
                    GSHEET_SCHEME, s
                ))
            })?;
            if id.is_empty() || worksheet.is_empty() {
                return Err(AppError::invalid_config(format!("Incomplete sheet location '{}'", s)));
            }
            return Ok(SheetLocation::Google {
                spreadsheet_id: id.to_string(),
                worksheet: worksheet.to_string(),
            });
        }

        if let Some((path, worksheet)) = s.rsplit_once('#') {
            if is_workbook_path(path) {
                return Ok(SheetLocation::Workbook {
                    path: PathBuf::from(path),
                    worksheet: Some(worksheet.to_string()).filter(|w| !w.is_empty()),
                });
            }
        }

        if is_workbook_path(s) {
            return Ok(SheetLocation::Workbook {
                path: PathBuf::from(s),
                worksheet: None,
            });
        }

        Ok(SheetLocation::Csv(PathBuf::from(s)))
    }
}

/// A concrete sheet
pub enum Sheet {
    Csv(CsvSheet),
    Xlsx(XlsxSheet),
    Google(GoogleSheet),
}

impl Sheet {
    /// Open a location. Google locations need a client.
    pub fn open(location: &SheetLocation, google: Option<&GoogleSheetsClient>) -> AppResult<Self> {
        Ok(match location {
            SheetLocation::Csv(path) => Sheet::Csv(CsvSheet::new(path.clone())),
            SheetLocation::Workbook { path, worksheet } => {
                Sheet::Xlsx(XlsxSheet::new(path.clone(), worksheet.clone()))
            }
            SheetLocation::Google {
                spreadsheet_id,
                worksheet,
            } => {
                let client = google.ok_or_else(|| AppError::missing_env("GOOGLE_OAUTH_TOKEN"))?;
                Sheet::Google(GoogleSheet::new(
                    client.clone(),
                    spreadsheet_id.clone(),
                    worksheet.clone(),
                ))
            }
        })
    }

    /// All rows, header included. A sheet that does not exist yet reads as empty.
    pub async fn read_rows(&self) -> AppResult<Vec<Row>> {
        match self {
            Sheet::Csv(s) => s.read_rows().await,
            Sheet::Xlsx(s) => s.read_rows().await,
            Sheet::Google(s) => s.read_rows().await,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Sheet::Xlsx(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Sheet::Csv(s) => s.path().display().to_string(),
            Sheet::Xlsx(s) => s.describe(),
            Sheet::Google(s) => s.describe(),
        }
    }
}

impl SheetSink for Sheet {
    async fn append_rows(&self, rows: &[Row]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        match self {
            Sheet::Csv(s) => s.append_rows(rows).await,
            Sheet::Xlsx(s) => Err(read_only(&s.describe())),
            Sheet::Google(s) => s.append_rows(rows).await,
        }
    }
}

pub fn read_only(location: &str) -> AppError {
    AppError::new(
        ErrorCode::SheetReadOnly,
        format!("{} is read-only, write results to CSV or Google Sheets", location),
    )
}

/// Read an output sheet, writing `header` first if the sheet is empty.
///
/// Returns the rows as read (empty for a fresh sheet). Rows appended later
/// must follow [`output_layout`] of these rows.
pub async fn prepare_output(sheet: &Sheet, header: &[String]) -> AppResult<Vec<Row>> {
    let rows = sheet.read_rows().await?;
    match rows.first() {
        None => {
            info!("📝 Initializing header on {}", sheet.describe());
            sheet.append_rows(&[header.to_vec()]).await?;
        }
        Some(existing) if existing.as_slice() != header => {
            warn!(
                "⚠️ Header on {} differs from the configured columns, rows follow the existing header",
                sheet.describe()
            );
        }
        Some(_) => {}
    }
    Ok(rows)
}

/// Header new rows are laid out under: the sheet's own header row when it has
/// one, `configured` otherwise
pub fn output_layout(rows: &[Row], configured: &[String]) -> Row {
    match rows.first() {
        Some(existing) if existing.iter().any(|h| !h.trim().is_empty()) => existing.clone(),
        _ => configured.to_vec(),
    }
}

/// Extract identifier cells from an input sheet (header row skipped)
pub fn read_identifier_cells(rows: &[Row], column: &InputColumn) -> AppResult<Vec<String>> {
    let empty = Row::new();
    let (header, data) = rows.split_first().unwrap_or((&empty, &[][..]));

    let idx = match column {
        InputColumn::Index(0) => {
            return Err(AppError::invalid_config("Input column index is 1-based"));
        }
        InputColumn::Index(i) => i - 1,
        InputColumn::Name(name) => header
            .iter()
            .position(|h| h.trim() == name.trim())
            .ok_or_else(|| AppError::missing_column(column))?,
    };

    Ok(data
        .iter()
        .filter_map(|row| row.get(idx))
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect())
}
