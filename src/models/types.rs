//! Shared data types for the scrape pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::normalize::normalize_regno;
use crate::models::errors::{AppError, ErrorCode};

/// Detail record as returned inside `datail_string`
pub type Detail = serde_json::Map<String, serde_json::Value>;

/// A sheet row
pub type Row = Vec<String>;

/// Registration (notify) number in both its displayed and normalized forms.
///
/// `raw` is what the operator typed (`10-2-6700038284`), `regnos` is what the
/// registry expects (`1026700038284`). Equality and hashing only look at
/// `regnos`, which is the dedup key everywhere in the pipeline.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct NotifyNumber {
    pub raw: String,
    pub regnos: String,
}

impl NotifyNumber {
    /// Parse a sheet cell. Blank cells and cells made only of separators yield `None`.
    pub fn parse(cell: &str) -> Option<Self> {
        let raw = cell.trim();
        let regnos = normalize_regno(raw);
        if regnos.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            regnos,
        })
    }
}

impl PartialEq for NotifyNumber {
    fn eq(&self, other: &Self) -> bool {
        self.regnos == other.regnos
    }
}

impl std::hash::Hash for NotifyNumber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.regnos.hash(state);
    }
}

impl fmt::Display for NotifyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Terminal failure for one identifier, after retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub code: ErrorCode,
    pub message: String,
    pub attempts: u32,
}

impl FetchFailure {
    pub fn from_error(err: &AppError, attempts: u32) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            attempts,
        }
    }
}

/// Result of fetching one identifier. Exactly one per identifier.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        id: NotifyNumber,
        detail: Detail,
        attempts: u32,
    },
    Failure {
        id: NotifyNumber,
        failure: FetchFailure,
    },
}

impl Outcome {
    pub fn id(&self) -> &NotifyNumber {
        match self {
            Outcome::Success { id, .. } | Outcome::Failure { id, .. } => id,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success { attempts, .. } => *attempts,
            Outcome::Failure { failure, .. } => failure.attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}
