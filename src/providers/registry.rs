//! Cosmetics Registry Client
//!
//! The registry exposes a single RPC-style endpoint. Every call POSTs the same
//! `MODEL` envelope; the function to run is named in `M_SYSTEM_SETTING` and its
//! argument travels in `datail_string` (sic). The answer mirrors the envelope:
//! `{"MODEL": {"datail_string": {...fields...}}}`.
//!
//! Transport failures and non-2xx statuses are retried with linear backoff.
//! A body that is not JSON, or a lookup that comes back without any detail
//! fields, is a final answer and is not retried.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::retry::{retry, RetryPolicy};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Detail, FetchFailure, NotifyNumber, Outcome};
use crate::utils::constants::{ACCEPT_HEADER, DETAIL_FUNCTION_NAME, USER_AGENT as USER_AGENT_CONST};

/// Longest body excerpt quoted in an error message
const BODY_EXCERPT_CHARS: usize = 120;

// ============================================
// Request envelope
// ============================================

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    #[serde(rename = "MODEL")]
    pub model: EnvelopeModel<'a>,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeModel<'a> {
    #[serde(rename = "M_SYSTEM_SETTING")]
    pub system_setting: SystemSetting,
    #[serde(rename = "M_AUTHENTICATION")]
    pub authentication: Empty,
    #[serde(rename = "DATA_SET")]
    pub data_set: Empty,
    #[serde(rename = "DATA_TRANSLATION_OB")]
    pub data_translation: Option<Empty>,
    #[serde(rename = "Search")]
    pub search: Empty,
    #[serde(rename = "datail_string")]
    pub detail: DetailQuery<'a>,
    #[serde(rename = "M_tran")]
    pub tran: Empty,
}

#[derive(Debug, Serialize)]
pub struct SystemSetting {
    #[serde(rename = "FUNCTION_NAME")]
    pub function_name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetailQuery<'a> {
    pub regnos: &'a str,
}

/// Serializes as `{}`
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Build the detail-lookup envelope for one registration number
pub fn build_envelope(regnos: &str) -> Envelope<'_> {
    Envelope {
        model: EnvelopeModel {
            system_setting: SystemSetting {
                function_name: DETAIL_FUNCTION_NAME,
            },
            authentication: Empty::default(),
            data_set: Empty::default(),
            data_translation: None,
            search: Empty::default(),
            detail: DetailQuery { regnos },
            tran: Empty::default(),
        },
    }
}

// ============================================
// Response parsing
// ============================================

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    let mut out: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    if trimmed.chars().count() > BODY_EXCERPT_CHARS {
        out.push('…');
    }
    out
}

/// Pull `datail_string` out of a response body.
///
/// `MODEL` is optional: some deployments answer with the model at top level.
pub fn parse_detail(regnos: &str, body: &str) -> AppResult<Detail> {
    let data: Value = serde_json::from_str(body).map_err(|e| {
        AppError::invalid_response(format!("Response is not JSON ({}): {}", e, excerpt(body)))
    })?;

    let model = data.get("MODEL").unwrap_or(&data);
    if !model.is_object() {
        return Err(AppError::invalid_response(format!(
            "Unexpected response shape: {}",
            excerpt(body)
        )));
    }

    match model.get("datail_string") {
        Some(Value::Object(detail)) if !detail.is_empty() => Ok(detail.clone()),
        None | Some(Value::Null) | Some(Value::Object(_)) => Err(AppError::empty_detail(regnos)),
        Some(other) => Err(AppError::invalid_response(format!(
            "datail_string is not an object: {}",
            excerpt(&other.to_string())
        ))),
    }
}

// ============================================
// Client
// ============================================

/// Registry client. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    url: String,
}

impl RegistryClient {
    pub fn new(url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Self::build_client(timeout)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// HTTP client with the headers the registry's own front end sends
    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))
    }

    /// Single request, no retry
    pub async fn fetch_once(&self, regnos: &str) -> AppResult<Detail> {
        let response = self
            .client
            .post(&self.url)
            .json(&build_envelope(regnos))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_detail(regnos, &body)
    }

    /// Fetch one identifier under the retry policy. Never fails: exhausted or
    /// final errors come back as `Outcome::Failure`.
    pub async fn fetch_detail(&self, id: NotifyNumber, policy: &RetryPolicy) -> Outcome {
        let result = retry(policy, |attempt| {
            debug!("🔍 {} attempt {}", id.regnos, attempt);
            self.fetch_once(&id.regnos)
        })
        .await;

        match result {
            Ok((detail, attempts)) => Outcome::Success {
                id,
                detail,
                attempts,
            },
            Err(e) => {
                warn!(
                    "❌ {} failed after {} attempt(s): {}",
                    id.raw, e.attempts, e.error
                );
                Outcome::Failure {
                    failure: FetchFailure::from_error(&e.error, e.attempts),
                    id,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(build_envelope("1026700038284")).unwrap();
        assert_eq!(
            value,
            json!({
                "MODEL": {
                    "M_SYSTEM_SETTING": {"FUNCTION_NAME": "get_detail_regnos"},
                    "M_AUTHENTICATION": {},
                    "DATA_SET": {},
                    "DATA_TRANSLATION_OB": null,
                    "Search": {},
                    "datail_string": {"regnos": "1026700038284"},
                    "M_tran": {}
                }
            })
        );
    }

    #[test]
    fn test_parse_nested_detail() {
        let body = r#"{"MODEL":{"datail_string":{"regnos":"1026700038284","lb_status":"คงอยู่"}}}"#;
        let detail = parse_detail("1026700038284", body).unwrap();
        assert_eq!(detail["lb_status"], "คงอยู่");
    }

    #[test]
    fn test_parse_top_level_model() {
        let body = r#"{"datail_string":{"regnos":"1"}}"#;
        assert!(parse_detail("1", body).is_ok());
    }

    #[test]
    fn test_parse_empty_detail() {
        for body in [
            r#"{"MODEL":{"datail_string":null}}"#,
            r#"{"MODEL":{"datail_string":{}}}"#,
            r#"{"MODEL":{}}"#,
        ] {
            let err = parse_detail("1", body).unwrap_err();
            assert_eq!(err.code, ErrorCode::ApiEmptyDetail, "body {}", body);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_detail("1", "<html>502 Bad Gateway</html>").unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiInvalidResponse);

        let err = parse_detail("1", r#"{"MODEL":{"datail_string":"oops"}}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiInvalidResponse);

        let err = parse_detail("1", r#""just a string""#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiInvalidResponse);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), BODY_EXCERPT_CHARS + 1);
        assert!(e.ends_with('…'));
        assert_eq!(excerpt(" short "), "short");
    }
}
