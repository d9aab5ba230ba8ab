//! Google Sheets backend (REST v4, bearer token)
//!
//! Only two calls are needed:
//! - `GET  /v4/spreadsheets/{id}/values/{range}` to read a worksheet
//! - `POST /v4/spreadsheets/{id}/values/{range}:append` to append rows
//!
//! The token is a pre-issued OAuth access token with the spreadsheets scope
//! (e.g. `gcloud auth print-access-token`).

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::flatten::cell_text;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::Row;
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody<'a> {
    major_dimension: &'static str,
    values: &'a [Row],
}

/// Shared HTTP client for all worksheets of a run
#[derive(Clone)]
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GoogleSheetsClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> AppResult<Self> {
        if token.trim().is_empty() {
            return Err(AppError::missing_env("GOOGLE_OAUTH_TOKEN"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::invalid_config(format!("Invalid Sheets API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::invalid_config("Sheets API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }

    /// Read every row of a range. Cells come back formatted, as strings.
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> AppResult<Vec<Row>> {
        let url = self.values_url(spreadsheet_id, range)?;
        debug!("📄 Sheets GET {}", range);

        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::sheet_api(format!(
                "Sheets API {} reading {}: {}",
                status, range, body
            )));
        }

        let data: ValueRange = response
            .json()
            .await
            .map_err(|e| AppError::sheet_api(format!("Unexpected Sheets response: {}", e)))?;

        Ok(data
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    /// Append rows after the last row of the table found at `range`
    pub async fn append_values(&self, spreadsheet_id: &str, range: &str, rows: &[Row]) -> AppResult<()> {
        let mut url = self.values_url(spreadsheet_id, &format!("{}:append", range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        debug!("📄 Sheets APPEND {} ({} rows)", range, rows.len());

        let body = AppendBody {
            major_dimension: "ROWS",
            values: rows,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::sheet_api(format!(
                "Sheets API {} appending to {}: {}",
                status, range, body
            )));
        }
        Ok(())
    }
}

/// A worksheet inside a spreadsheet
#[derive(Clone)]
pub struct GoogleSheet {
    client: GoogleSheetsClient,
    spreadsheet_id: String,
    worksheet: String,
}

impl GoogleSheet {
    pub fn new(client: GoogleSheetsClient, spreadsheet_id: String, worksheet: String) -> Self {
        Self {
            client,
            spreadsheet_id,
            worksheet,
        }
    }

    pub fn describe(&self) -> String {
        format!("gsheet:{}/{}", self.spreadsheet_id, self.worksheet)
    }

    /// Whole-worksheet range in A1 notation
    fn sheet_range(&self) -> String {
        format!("'{}'", self.worksheet.replace('\'', "''"))
    }

    pub async fn read_rows(&self) -> AppResult<Vec<Row>> {
        self.client
            .get_values(&self.spreadsheet_id, &self.sheet_range())
            .await
    }

    pub async fn append_rows(&self, rows: &[Row]) -> AppResult<()> {
        let range = format!("{}!A1", self.sheet_range());
        self.client
            .append_values(&self.spreadsheet_id, &range, rows)
            .await
    }
}
