//! Detail record → sheet row

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::models::types::{Detail, FetchFailure, NotifyNumber, Row};
use crate::utils::constants::{
    ERROR_COLUMNS, EXTRA_JSON_COLUMN, FETCHED_AT_COLUMN, NOTIFY_NUMBER_COLUMN, REGNOS_COLUMN,
};

/// Render one JSON value as a cell
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // serde_json keeps non-ASCII as-is
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RESULT sheet header
pub fn result_header(columns: &[String], capture_extra: bool) -> Row {
    let mut header = Vec::with_capacity(columns.len() + 3);
    header.push(NOTIFY_NUMBER_COLUMN.to_string());
    header.extend(columns.iter().cloned());
    header.push(FETCHED_AT_COLUMN.to_string());
    if capture_extra {
        header.push(EXTRA_JSON_COLUMN.to_string());
    }
    header
}

/// ERROR sheet header
pub fn error_header() -> Row {
    ERROR_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Lay a detail record out under `header`, matching columns by name.
///
/// `header` is either [`result_header`] for a fresh sheet or the header row an
/// existing sheet already carries. Names the record does not have stay blank;
/// record fields the header does not name go to `extra_json` when the header
/// has that column and are dropped otherwise.
pub fn detail_to_row(id: &NotifyNumber, detail: &Detail, header: &[String], fetched_at: DateTime<Utc>) -> Row {
    header
        .iter()
        .map(|name| match name.trim() {
            NOTIFY_NUMBER_COLUMN => id.raw.clone(),
            FETCHED_AT_COLUMN => timestamp(fetched_at),
            EXTRA_JSON_COLUMN => extra_json(detail, header),
            REGNOS_COLUMN => match detail.get(REGNOS_COLUMN).map(cell_text) {
                Some(text) if !text.is_empty() => text,
                _ => id.regnos.clone(),
            },
            field => detail.get(field).map(cell_text).unwrap_or_default(),
        })
        .collect()
}

fn extra_json(detail: &Detail, header: &[String]) -> String {
    let extra: Detail = detail
        .iter()
        .filter(|(k, _)| !header.iter().any(|h| h.trim() == k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if extra.is_empty() {
        String::new()
    } else {
        Value::Object(extra).to_string()
    }
}

/// ERROR sheet row, laid out under `header` like [`detail_to_row`]
pub fn failure_to_row(id: &NotifyNumber, failure: &FetchFailure, header: &[String], failed_at: DateTime<Utc>) -> Row {
    header
        .iter()
        .map(|name| match name.trim() {
            NOTIFY_NUMBER_COLUMN => id.raw.clone(),
            REGNOS_COLUMN => id.regnos.clone(),
            "error_code" => failure.code.as_str().to_string(),
            "error_message" => failure.message.clone(),
            "attempts" => failure.attempts.to_string(),
            "failed_at" => timestamp(failed_at),
            _ => String::new(),
        })
        .collect()
}

/// Identifier a written row belongs to, read back through its header
pub fn row_identifier(header: &[String], row: &[String]) -> Option<NotifyNumber> {
    [NOTIFY_NUMBER_COLUMN, REGNOS_COLUMN]
        .iter()
        .filter_map(|key| header.iter().position(|h| h.trim() == *key))
        .chain(std::iter::once(0))
        .find_map(|i| row.get(i).and_then(|cell| NotifyNumber::parse(cell)))
}
