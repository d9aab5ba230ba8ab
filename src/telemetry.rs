//! Run statistics
//!
//! Lock-free counters updated by the consumer loop, a periodic progress line,
//! and a serializable end-of-run summary that can be exported as JSON.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use uuid::Uuid;

use crate::models::errors::AppResult;
use crate::models::types::Outcome;

/// End-of-run summary
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    /// Distinct identifiers in the input
    pub total_input: u64,
    /// Identifiers already present in RESULT
    pub already_done: u64,
    /// Identifiers scheduled for fetching
    pub to_do: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Extra attempts beyond the first, summed over identifiers
    pub retries: u64,
    pub result_rows_written: u64,
    pub error_rows_written: u64,
    pub failures_by_code: BTreeMap<String, u64>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Human-readable block for the end of the log
    pub fn report(&self) -> String {
        let mut out = format!(
            "\n  Run {}\n  ─────────────────────────────────────\n  \
             Input identifiers : {:>8}\n  \
             Already done      : {:>8}\n  \
             Fetched           : {:>8}\n  \
             Succeeded         : {:>8}\n  \
             Failed            : {:>8}\n  \
             Retries           : {:>8}\n  \
             Rows → RESULT     : {:>8}\n  \
             Rows → ERROR      : {:>8}\n  \
             Elapsed           : {:>8.1}s\n",
            self.run_id,
            self.total_input,
            self.already_done,
            self.completed,
            self.succeeded,
            self.failed,
            self.retries,
            self.result_rows_written,
            self.error_rows_written,
            self.elapsed_secs,
        );
        for (code, count) in &self.failures_by_code {
            out.push_str(&format!("    {:<22}{:>8}\n", code, count));
        }
        out
    }
}

/// Live counters for one run
pub struct RunStats {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    total_input: AtomicU64,
    already_done: AtomicU64,
    to_do: AtomicU64,
    completed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    result_rows_written: AtomicU64,
    error_rows_written: AtomicU64,
    failures_by_code: DashMap<&'static str, u64>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            total_input: AtomicU64::new(0),
            already_done: AtomicU64::new(0),
            to_do: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            result_rows_written: AtomicU64::new(0),
            error_rows_written: AtomicU64::new(0),
            failures_by_code: DashMap::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_plan(&self, total_input: usize, already_done: usize, to_do: usize) {
        self.total_input.store(total_input as u64, Ordering::Relaxed);
        self.already_done.store(already_done as u64, Ordering::Relaxed);
        self.to_do.store(to_do as u64, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &Outcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.retries
            .fetch_add(outcome.attempts().saturating_sub(1) as u64, Ordering::Relaxed);

        match outcome {
            Outcome::Success { .. } => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure { failure, .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                *self.failures_by_code.entry(failure.code.as_str()).or_insert(0) += 1;
            }
        }
    }

    /// Running totals as reported by the batch writers
    pub fn record_rows_written(&self, results: u64, errors: u64) {
        self.result_rows_written.store(results, Ordering::Relaxed);
        self.error_rows_written.store(errors, Ordering::Relaxed);
    }

    /// One-line progress for the periodic log
    pub fn progress_line(&self) -> String {
        let completed = self.completed.load(Ordering::Relaxed);
        let to_do = self.to_do.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { completed as f64 / elapsed } else { 0.0 };
        let pct = if to_do > 0 { completed as f64 * 100.0 / to_do as f64 } else { 100.0 };
        format!(
            "📊 Progress {}/{} ({:.1}%) | ok: {} | failed: {} | retries: {} | {:.1} item/s",
            completed,
            to_do,
            pct,
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            rate,
        )
    }

    pub fn snapshot(&self) -> RunSummary {
        let failures_by_code = self
            .failures_by_code
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();

        RunSummary {
            run_id: self.run_id.to_string(),
            started_at: self.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            total_input: self.total_input.load(Ordering::Relaxed),
            already_done: self.already_done.load(Ordering::Relaxed),
            to_do: self.to_do.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            result_rows_written: self.result_rows_written.load(Ordering::Relaxed),
            error_rows_written: self.error_rows_written.load(Ordering::Relaxed),
            failures_by_code,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

/// Write a summary as pretty JSON, creating parent directories
pub fn export_summary(summary: &RunSummary, path: &Path) -> AppResult<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, summary.to_json())?;
    Ok(path.to_path_buf())
}
