//! Command line
//!
//! Precedence, lowest first: built-in defaults, `--config` JSON file,
//! environment, flags.

use clap::Parser;
use std::path::PathBuf;

use crate::models::config::ScraperConfig;
use crate::models::errors::AppResult;
use crate::sheets::InputColumn;
use crate::utils::constants::{
    ERROR_SHEET_NAME, GSHEET_SCHEME, INPUT_SHEET_NAME, RESULT_SHEET_NAME,
};

#[derive(Debug, Parser)]
#[command(name = "cosmetica_scraper", version, about = "Fetch cosmetics notification details into RESULT / ERROR sheets")]
pub struct Args {
    /// JSON file with config overrides
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Input sheet: CSV path, workbook path (book.xlsx#Sheet) or gsheet:<id>/<worksheet>
    #[arg(long)]
    pub input: Option<String>,
    /// Identifier column, by header text or 1-based index
    #[arg(long)]
    pub input_column: Option<InputColumn>,
    /// RESULT sheet location
    #[arg(long)]
    pub results: Option<String>,
    /// ERROR sheet location
    #[arg(long)]
    pub errors: Option<String>,

    /// Use the INPUT / RESULT / ERROR worksheets of this spreadsheet
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,
    /// OAuth access token for Google Sheets
    #[arg(long, env = "GOOGLE_OAUTH_TOKEN", hide_env_values = true)]
    pub google_token: Option<String>,
    #[arg(long, env = "REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Concurrent requests
    #[arg(long)]
    pub workers: Option<usize>,
    /// Attempts per identifier, including the first
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Linear backoff base (attempt N waits N x this)
    #[arg(long)]
    pub backoff_ms: Option<u64>,
    #[arg(long)]
    pub jitter_percent: Option<u64>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Rows per append
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub flush_interval_secs: Option<u64>,

    /// Keep unlisted detail fields as JSON in a trailing column
    #[arg(long)]
    pub capture_extra: bool,
    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// Report what would be fetched, then exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn into_config(self) -> AppResult<ScraperConfig> {
        let mut config = match &self.config {
            Some(path) => ScraperConfig::from_file(path)?,
            None => ScraperConfig::default(),
        };

        if let Some(id) = &self.spreadsheet_id {
            let location = |ws: &str| format!("{}{}/{}", GSHEET_SCHEME, id, ws);
            config.input = location(INPUT_SHEET_NAME);
            config.results = location(RESULT_SHEET_NAME);
            config.errors = location(ERROR_SHEET_NAME);
        }

        if let Some(v) = self.input {
            config.input = v;
        }
        if let Some(v) = self.input_column {
            config.input_column = Some(v);
        }
        if let Some(v) = self.results {
            config.results = v;
        }
        if let Some(v) = self.errors {
            config.errors = v;
        }
        if let Some(v) = self.google_token {
            config.google_token = Some(v);
        }
        if let Some(v) = self.registry_url {
            config.registry_url = v;
        }
        if let Some(v) = self.workers {
            config.max_workers = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.backoff_ms {
            config.backoff_base_ms = v;
        }
        if let Some(v) = self.jitter_percent {
            config.jitter_percent = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.flush_interval_secs {
            config.flush_interval_secs = v;
        }
        if let Some(v) = self.summary {
            config.summary_path = Some(v);
        }
        config.capture_extra |= self.capture_extra;
        config.dry_run |= self.dry_run;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["cosmetica_scraper"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let mut args = parse(&[]);
        // env may carry these on a developer machine
        args.spreadsheet_id = None;
        args.google_token = None;
        args.registry_url = None;
        let config = args.into_config().unwrap();
        assert_eq!(config.max_workers, 30);
        assert_eq!(config.batch_size, 100);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_spreadsheet_id_sets_all_locations() {
        let config = parse(&["--spreadsheet-id", "abc", "--google-token", "t"])
            .into_config()
            .unwrap();
        assert_eq!(config.input, "gsheet:abc/INPUT");
        assert_eq!(config.results, "gsheet:abc/RESULT");
        assert_eq!(config.errors, "gsheet:abc/ERROR");
        assert_eq!(config.google_token.as_deref(), Some("t"));
        // the INPUT worksheet is read from column A whatever its header
        assert_eq!(config.input_column(), InputColumn::Index(1));
    }

    #[test]
    fn test_spreadsheet_id_keeps_explicit_column() {
        let config = parse(&["--spreadsheet-id", "abc", "--input-column", "notify"])
            .into_config()
            .unwrap();
        assert_eq!(config.input_column(), InputColumn::Name("notify".into()));
    }

    #[test]
    fn test_explicit_location_beats_spreadsheet_id() {
        let config = parse(&["--spreadsheet-id", "abc", "--input", "local.csv"])
            .into_config()
            .unwrap();
        assert_eq!(config.input, "local.csv");
        assert_eq!(config.results, "gsheet:abc/RESULT");
    }

    #[test]
    fn test_flags_override() {
        let config = parse(&[
            "--workers", "5",
            "--max-attempts", "4",
            "--backoff-ms", "250",
            "--batch-size", "10",
            "--input-column", "2",
            "--capture-extra",
            "--dry-run",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.backoff_base_ms, 250);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.input_column(), InputColumn::Index(2));
        assert!(config.capture_extra);
        assert!(config.dry_run);
    }

    #[test]
    fn test_config_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_workers": 8, "batch_size": 50}}"#).unwrap();
        let path = file.path().display().to_string();

        let config = parse(&["--config", &path, "--batch-size", "20"])
            .into_config()
            .unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.batch_size, 20);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse(&["--workers", "0"]).into_config().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }
}
