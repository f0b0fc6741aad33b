//! Structured error output for scripts and agents driving the CLI.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::ChromemateError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
/// Format: `SCREAMING_SNAKE_CASE` for easy parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Store Errors (exit code 2) ===
    /// History store file not found
    StoreNotFound,
    /// History store could not be parsed or queried
    StoreUnreadable,
    /// Database operation failed
    DatabaseError,

    // === Write-back Errors (exit code 3) ===
    /// Target store locked or not writable
    WriteBackDenied,
    /// Target store could not be replaced
    WriteBackFailed,

    // === Config and Usage Errors (exit code 7) ===
    /// Configuration error
    ConfigError,
    /// Config parse error
    ConfigParseError,
    /// Source and target are the same store
    SameStore,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StoreNotFound => "STORE_NOT_FOUND",
            Self::StoreUnreadable => "STORE_UNREADABLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::WriteBackDenied => "WRITE_BACK_DENIED",
            Self::WriteBackFailed => "WRITE_BACK_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::ConfigParseError => "CONFIG_PARSE_ERROR",
            Self::SameStore => "SAME_STORE",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Whether the whole operation may succeed if re-invoked.
    ///
    /// Nothing is retried internally; a denied write-back usually succeeds
    /// once the browser holding the file has been closed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::WriteBackDenied)
    }

    /// Get the exit code for this error category.
    ///
    /// - 2: Store errors
    /// - 3: Write-back errors
    /// - 7: Config and usage errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::StoreNotFound | Self::StoreUnreadable | Self::DatabaseError => 2,
            Self::WriteBackDenied | Self::WriteBackFailed => 3,
            Self::ConfigError | Self::ConfigParseError | Self::SameStore => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `ChromemateError`.
    #[must_use]
    pub fn from_error(err: &ChromemateError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);

        Self {
            code,
            message: err.to_string(),
            hint: err.suggestion().map(str::to_string),
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &ChromemateError) -> (ErrorCode, Option<Value>) {
        match err {
            ChromemateError::StoreNotFound { side, path } => (
                ErrorCode::StoreNotFound,
                Some(json!({"side": side.as_str(), "path": path.display().to_string()})),
            ),
            ChromemateError::StoreUnreadable { side, path, reason } => (
                ErrorCode::StoreUnreadable,
                Some(json!({
                    "side": side.as_str(),
                    "path": path.display().to_string(),
                    "reason": reason,
                })),
            ),
            ChromemateError::Database(_) => (ErrorCode::DatabaseError, None),
            ChromemateError::WriteBackDenied { path, .. } => (
                ErrorCode::WriteBackDenied,
                Some(json!({"path": path.display().to_string()})),
            ),
            ChromemateError::WriteBackFailed { path, .. } => (
                ErrorCode::WriteBackFailed,
                Some(json!({"path": path.display().to_string()})),
            ),
            ChromemateError::SameStore { path } => (
                ErrorCode::SameStore,
                Some(json!({"path": path.display().to_string()})),
            ),
            ChromemateError::Config(_) => (ErrorCode::ConfigError, None),
            ChromemateError::Yaml(_) => (ErrorCode::ConfigParseError, None),
            ChromemateError::Io(_) => (ErrorCode::IoError, None),
            ChromemateError::Json(_) => (ErrorCode::JsonError, None),
        }
    }
}
