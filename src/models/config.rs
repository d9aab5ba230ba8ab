//! Scraper configuration
//!
//! Defaults mirror the values the registry tolerates in practice. A JSON file
//! passed with `--config` overrides any subset of fields; CLI flags win last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::models::errors::{AppError, AppResult};
use crate::sheets::InputColumn;
use crate::utils::constants::{
    default_detail_columns, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BATCH_SIZE,
    DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_INPUT_COLUMN, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_WORKERS, DEFAULT_TIMEOUT_SECS, GOOGLE_SHEETS_API, GSHEET_SCHEME, REGISTRY_URL,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Registry endpoint
    pub registry_url: String,
    /// Sheets REST base URL (overridable for tests / proxies)
    pub sheets_api_url: String,

    /// Where identifiers are read from
    pub input: String,
    /// Identifier column in the input sheet. Unset means column A for a
    /// Google Sheets input and the `เลขที่จดแจ้ง` header otherwise.
    pub input_column: Option<InputColumn>,
    /// RESULT sheet location
    pub results: String,
    /// ERROR sheet location
    pub errors: String,

    /// Bearer token for the Google Sheets backend
    #[serde(skip_serializing)]
    pub google_token: Option<String>,

    /// Maximum concurrent in-flight requests
    pub max_workers: usize,
    /// Timeout for a single registry request
    pub timeout_secs: u64,
    /// Attempts per identifier, including the first
    pub max_attempts: u32,
    /// Linear backoff base in milliseconds
    pub backoff_base_ms: u64,
    /// Random jitter applied to each backoff delay (0-100)
    pub jitter_percent: u64,

    /// Rows per append
    pub batch_size: usize,
    /// Flush partial batches after this many seconds
    pub flush_interval_secs: u64,

    /// Detail fields written to the RESULT sheet, in order
    pub detail_columns: Vec<String>,
    /// Keep unlisted detail fields in a trailing JSON column
    pub capture_extra: bool,

    /// Write the run summary as JSON here when set
    pub summary_path: Option<PathBuf>,
    /// Report the resume diff and exit without fetching
    pub dry_run: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            registry_url: REGISTRY_URL.to_string(),
            sheets_api_url: GOOGLE_SHEETS_API.to_string(),
            input: "input.xlsx".to_string(),
            input_column: None,
            results: "cosmetica_results.csv".to_string(),
            errors: "cosmetica_errors.csv".to_string(),
            google_token: None,
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            jitter_percent: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            detail_columns: default_detail_columns(),
            capture_extra: false,
            summary_path: None,
            dry_run: false,
        }
    }
}

impl ScraperConfig {
    /// Load overrides from a JSON file; unspecified fields keep their defaults
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            AppError::invalid_config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            jitter_percent: self.jitter_percent,
        }
    }

    /// Column to read identifiers from, after applying the per-backend default
    pub fn input_column(&self) -> InputColumn {
        match &self.input_column {
            Some(column) => column.clone(),
            None if self.input.trim_start().starts_with(GSHEET_SCHEME) => InputColumn::Index(1),
            None => InputColumn::Name(DEFAULT_INPUT_COLUMN.to_string()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.max_workers == 0 {
            return Err(AppError::invalid_config("max_workers must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(AppError::invalid_config("max_attempts must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(AppError::invalid_config("batch_size must be at least 1"));
        }
        if self.jitter_percent > 100 {
            return Err(AppError::invalid_config("jitter_percent must be within 0..=100"));
        }
        if self.detail_columns.is_empty() {
            return Err(AppError::invalid_config("detail_columns must not be empty"));
        }
        if self.results == self.errors {
            return Err(AppError::invalid_config(
                "results and errors must point at different sheets",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScraperConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_workers, 30);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.detail_columns.len(), 32);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = ScraperConfig {
            max_attempts: 5,
            backoff_base_ms: 3000,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = ScraperConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn test_validate_rejects_shared_output() {
        let config = ScraperConfig {
            results: "out.csv".into(),
            errors: "out.csv".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_workers": 4, "input_column": 1, "detail_columns": ["regnos", "lb_status"]}}"#
        )
        .unwrap();

        let config = ScraperConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.input_column(), InputColumn::Index(1));
        assert_eq!(config.detail_columns, vec!["regnos", "lb_status"]);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.registry_url, REGISTRY_URL);
    }

    #[test]
    fn test_input_column_default_follows_backend() {
        let local = ScraperConfig::default();
        assert_eq!(local.input_column(), InputColumn::Name(DEFAULT_INPUT_COLUMN.into()));

        let cloud = ScraperConfig {
            input: "gsheet:abc/INPUT".into(),
            ..Default::default()
        };
        assert_eq!(cloud.input_column(), InputColumn::Index(1));

        let explicit = ScraperConfig {
            input: "gsheet:abc/INPUT".into(),
            input_column: Some(InputColumn::Name("notify".into())),
            ..Default::default()
        };
        assert_eq!(explicit.input_column(), InputColumn::Name("notify".into()));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ScraperConfig::from_file(file.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}
