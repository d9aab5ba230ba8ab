//! Resume support
//!
//! The RESULT sheet is the only record of progress. On start the key column is
//! read back, normalized, and everything already present is skipped. Failed
//! identifiers never reach RESULT, so they are picked up again on the next run.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::core::normalize::normalize_regno;
use crate::models::types::{NotifyNumber, Row};
use crate::utils::constants::{NOTIFY_NUMBER_COLUMN, REGNOS_COLUMN};

/// Set of normalized identifiers already written to the output sheet
#[derive(Debug, Default, Clone)]
pub struct ResumeIndex {
    done: HashSet<String>,
}

impl ResumeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from all rows of an output sheet, header included.
    ///
    /// The key column is `notify_number`, falling back to `regnos`, then to the
    /// first column.
    pub fn from_rows(rows: &[Row]) -> Self {
        let Some((header, data)) = rows.split_first() else {
            return Self::new();
        };

        let key_col = locate_key_column(header).unwrap_or_else(|| {
            warn!(
                "⚠️ Output sheet has no '{}' or '{}' column, keying on column A",
                NOTIFY_NUMBER_COLUMN, REGNOS_COLUMN
            );
            0
        });

        let index = Self::from_keys(data.iter().filter_map(|row| row.get(key_col)));
        debug!("Resume index: {} keys from column {}", index.len(), key_col);
        index
    }

    /// Build from raw key cells; blanks are ignored
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let done = keys
            .into_iter()
            .map(|k| normalize_regno(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        Self { done }
    }

    #[inline]
    pub fn contains(&self, regnos: &str) -> bool {
        self.done.contains(regnos)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Identifiers not yet present in the output, in input order
    pub fn pending(&self, ids: Vec<NotifyNumber>) -> Vec<NotifyNumber> {
        ids.into_iter()
            .filter(|id| !self.contains(&id.regnos))
            .collect()
    }
}

fn locate_key_column(header: &[String]) -> Option<usize> {
    let find = |name: &str| header.iter().position(|h| h.trim() == name);
    find(NOTIFY_NUMBER_COLUMN).or_else(|| find(REGNOS_COLUMN))
}
