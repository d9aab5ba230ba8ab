//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so that error rows written to the
//! ERROR sheet can be filtered and counted without parsing free-form messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - NET_xxx / HTTP_xxx: transport errors (retryable)
//! - API_xxx: registry response errors (not retryable)
//! - SHEET_xxx: spreadsheet backend errors
//! - CFG_xxx: configuration errors (fatal)

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging and the ERROR sheet
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// True for errors that must abort the whole run
    pub fn is_fatal(&self) -> bool {
        self.code.is_config()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // ============================================
    // Transport Errors (1xx)
    // ============================================
    /// Connection refused / DNS / TLS failure
    NetConnectionFailed,
    /// Request timed out
    NetTimeout,
    /// Other transport-level failure
    NetError,
    /// Non-2xx HTTP status
    HttpStatus,
    /// HTTP 429
    HttpRateLimited,

    // ============================================
    // Registry API Errors (2xx)
    // ============================================
    /// Body was not the expected JSON shape
    ApiInvalidResponse,
    /// `datail_string` missing, null or empty
    ApiEmptyDetail,

    // ============================================
    // Sheet Errors (3xx)
    // ============================================
    /// Local file read/write failed
    SheetIo,
    /// Spreadsheet file could not be decoded
    SheetFormat,
    /// Cloud sheet API rejected a request
    SheetApi,
    /// Backend does not support the operation
    SheetReadOnly,

    // ============================================
    // Configuration Errors (4xx)
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Expected column not present in the input sheet
    ConfigMissingColumn,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic Errors (9xx)
    // ============================================
    /// Worker task panicked or was cancelled
    Unhandled,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetConnectionFailed => "NET_CONNECTION_FAILED",
            Self::NetTimeout => "NET_TIMEOUT",
            Self::NetError => "NET_ERROR",
            Self::HttpStatus => "HTTP_STATUS",
            Self::HttpRateLimited => "HTTP_RATE_LIMITED",

            Self::ApiInvalidResponse => "API_INVALID_RESPONSE",
            Self::ApiEmptyDetail => "API_EMPTY_DETAIL",

            Self::SheetIo => "SHEET_IO",
            Self::SheetFormat => "SHEET_FORMAT",
            Self::SheetApi => "SHEET_API",
            Self::SheetReadOnly => "SHEET_READ_ONLY",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigMissingColumn => "CFG_MISSING_COLUMN",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unhandled => "UNHANDLED",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetConnectionFailed
                | Self::NetTimeout
                | Self::NetError
                | Self::HttpStatus
                | Self::HttpRateLimited
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissingEnv | Self::ConfigMissingColumn | Self::ConfigInvalidValue
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Non-2xx status from an HTTP endpoint
    pub fn http_status(status: u16) -> Self {
        if status == 429 {
            Self::new(ErrorCode::HttpRateLimited, "Rate limited (HTTP 429)")
        } else {
            Self::new(ErrorCode::HttpStatus, format!("HTTP error: {}", status))
        }
    }

    /// Response body did not have the expected shape
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInvalidResponse, msg)
    }

    /// Registry answered without any detail fields
    pub fn empty_detail(regnos: &str) -> Self {
        Self::new(
            ErrorCode::ApiEmptyDetail,
            format!("Empty datail_string for regnos {}", regnos),
        )
    }

    /// Missing environment variable
    pub fn missing_env(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", name),
        )
    }

    /// Input column not found
    pub fn missing_column(column: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConfigMissingColumn,
            format!("Column not found in input sheet: {}", column),
        )
    }

    /// Invalid configuration value
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    /// Cloud sheet API error
    pub fn sheet_api(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SheetApi, msg)
    }

    /// Worker task failed outside of the fetch logic
    pub fn unhandled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unhandled, format!("unhandled: {}", msg.into()))
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::SheetIo, format!("IO error: {}", err), err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_source(ErrorCode::NetTimeout, "Request timeout", err)
        } else if err.is_connect() {
            Self::with_source(ErrorCode::NetConnectionFailed, "Connection failed", err)
        } else if let Some(status) = err.status() {
            Self::http_status(status.as_u16())
        } else {
            Self::new(ErrorCode::NetError, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorCode::ApiInvalidResponse,
            format!("JSON parse error: {}", err),
            err,
        )
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        Self::new(ErrorCode::SheetIo, format!("CSV error: {}", err))
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        Self::new(ErrorCode::SheetFormat, format!("Workbook error: {}", err))
    }
}
