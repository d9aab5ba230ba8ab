//! Local CSV sheet
//!
//! File access runs on the blocking pool so the consumer loop keeps polling
//! fetches while a batch is written.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Row;

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records; a missing file reads as an empty sheet
    pub async fn read_rows(&self) -> AppResult<Vec<Row>> {
        let path = self.path.clone();
        blocking(move || read_file(&path)).await
    }

    /// Append records, creating the file (and parent directories) on first write
    pub async fn append_rows(&self, rows: &[Row]) -> AppResult<()> {
        let path = self.path.clone();
        let rows = rows.to_vec();
        blocking(move || append_file(&path, &rows)).await
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::unhandled(format!("CSV task failed: {}", e)))?
}

fn read_file(path: &Path) -> AppResult<Vec<Row>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Row>());
    }

    // Spreadsheet apps prepend a BOM when exporting UTF-8
    if let Some(first) = rows.first_mut().and_then(|r| r.first_mut()) {
        if let Some(stripped) = first.strip_prefix(UTF8_BOM) {
            *first = stripped.to_string();
        }
    }

    Ok(rows)
}

fn append_file(path: &Path, rows: &[Row]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    // Keep records on their own line if the file was hand-edited
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(file);
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
