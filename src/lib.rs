//! Cosmetica Scraper Library
//!
//! Resumable scraper for the Thai FDA cosmetics notification registry:
//! - reads notification numbers from a CSV, workbook or Google Sheets worksheet
//! - skips numbers already present in the RESULT sheet
//! - fetches each detail record with bounded concurrency and linear-backoff retry
//! - appends flattened rows in batches to RESULT, failures to ERROR

pub mod cli;
pub mod core;
pub mod models;
pub mod providers;
pub mod scraper;
pub mod sheets;
pub mod telemetry;
pub mod utils;

pub use cli::Args;
pub use crate::core::{normalize_regno, BatchWriter, ResumeIndex, RetryPolicy};
pub use models::{AppError, AppResult, ErrorCode, NotifyNumber, Outcome, ScraperConfig};
pub use providers::RegistryClient;
pub use scraper::{Plan, Scraper};
pub use sheets::{Sheet, SheetLocation, SheetSink};
pub use telemetry::{RunStats, RunSummary};
