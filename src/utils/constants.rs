//! Constants Module - Single Source of Truth
//!
//! Endpoint, envelope and schema constants shared by the registry client,
//! the sheet backends and the configuration defaults.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "cosmetica_scraper";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = concat!("cosmetica_scraper/", env!("CARGO_PKG_VERSION"));

// ============================================
// REGISTRY API
// ============================================

/// Registry search backend, single RPC-style endpoint
pub const REGISTRY_URL: &str =
    "https://cosmetica.fda.moph.go.th/CMT_SEARCH_BACK_NEW/Home/FUNCTION_CENTER";

/// Function dispatched by the endpoint for a detail lookup
pub const DETAIL_FUNCTION_NAME: &str = "get_detail_regnos";

/// Accept header the registry's web front end sends
pub const ACCEPT_HEADER: &str = "application/json, text/plain, */*";

/// Per-request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Attempts per identifier
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff base: attempt N waits N * base
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Concurrent in-flight requests
pub const DEFAULT_MAX_WORKERS: usize = 30;

// ============================================
// SHEETS
// ============================================

/// Rows per append call on the RESULT / ERROR sheets
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Flush partially filled batches at least this often (seconds)
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Worksheet names in the cloud layout
pub const INPUT_SHEET_NAME: &str = "INPUT";
pub const RESULT_SHEET_NAME: &str = "RESULT";
pub const ERROR_SHEET_NAME: &str = "ERROR";

/// Google Sheets REST base URL
pub const GOOGLE_SHEETS_API: &str = "https://sheets.googleapis.com";

/// Header of the identifier column in the operator's workbook
pub const DEFAULT_INPUT_COLUMN: &str = "เลขที่จดแจ้ง";

/// Prefix selecting the Google Sheets backend in a sheet location
pub const GSHEET_SCHEME: &str = "gsheet:";

// ============================================
// ROW SCHEMA
// ============================================

/// Key column, always first in the RESULT and ERROR sheets
pub const NOTIFY_NUMBER_COLUMN: &str = "notify_number";

/// Normalized registration number
pub const REGNOS_COLUMN: &str = "regnos";

/// Trailing timestamp column on result rows
pub const FETCHED_AT_COLUMN: &str = "fetched_at";

/// Optional trailing column with unlisted detail fields
pub const EXTRA_JSON_COLUMN: &str = "extra_json";

/// Fields pulled out of `datail_string`, in sheet order
pub const DETAIL_COLUMNS: [&str; 32] = [
    "regnos",
    "type",
    "lb_lct_type",
    "EMPLOYER",
    "lb_NAME_EMPLOYER",
    "status_lct",
    "lb_format_regnos",
    "lb_trade_Tpop",
    "lb_trade_Tpop2",
    "lb_cosnm_Tpop",
    "lb_cosnm_Tpop2",
    "lb_appdate",
    "lb_fileattach_count",
    "lb_status",
    "lb_expdate",
    "lb_no_regnos",
    "lb_mode",
    "lb_applicability_name",
    "lb_condition",
    "lb_application_name",
    "lb_usernm_pop",
    "lb_locat_pop",
    "lb_fac_pop",
    "lb_NO_pop",
    "count_eng",
    "data_ampole",
    "file",
    "fileType",
    "province",
    "identify",
    "lctnmno",
    "physical_detail",
];

/// ERROR sheet header
pub const ERROR_COLUMNS: [&str; 6] = [
    "notify_number",
    "regnos",
    "error_code",
    "error_message",
    "attempts",
    "failed_at",
];

/// Default detail columns as owned strings
pub fn default_detail_columns() -> Vec<String> {
    DETAIL_COLUMNS.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_columns_unique() {
        let mut seen = std::collections::HashSet::new();
        for col in DETAIL_COLUMNS {
            assert!(seen.insert(col), "duplicate column {}", col);
        }
        assert_eq!(DETAIL_COLUMNS[0], REGNOS_COLUMN);
    }

    #[test]
    fn test_error_columns_start_with_key() {
        assert_eq!(ERROR_COLUMNS[0], NOTIFY_NUMBER_COLUMN);
        assert_eq!(ERROR_COLUMNS[1], REGNOS_COLUMN);
    }
}
