//! Error types and handling for `chromemate`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Every error is fatal to the current merge; nothing is retried internally
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output via [`StructuredError`]

mod structured;

pub use structured::{ErrorCode, StructuredError};

use crate::model::StoreSide;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `chromemate` operations.
#[derive(Error, Debug)]
pub enum ChromemateError {
    // === Store Errors ===
    /// History store file is absent. Raised before any working copy is made.
    #[error("{side} history not found: {}", path.display())]
    StoreNotFound { side: StoreSide, path: PathBuf },

    /// History store exists but cannot be opened, parsed or queried.
    #[error("{side} history at '{}' is unreadable: {reason}", path.display())]
    StoreUnreadable {
        side: StoreSide,
        path: PathBuf,
        reason: String,
    },

    /// `SQLite` error outside of store validation (e.g. a failed write on a working copy).
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Source and target resolve to the same store file.
    #[error("Source and target must be different history stores: {}", path.display())]
    SameStore { path: PathBuf },

    // === Write-back Errors ===
    /// The merged working copy could not replace the target (usually locked by the browser).
    #[error("Cannot write to history at '{}': {source}", path.display())]
    WriteBackDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other failure while replacing the target store.
    #[error("Failed to write history back to '{}': {source}", path.display())]
    WriteBackFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // === Configuration Errors ===
    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ChromemateError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreNotFound { .. }
                | Self::SameStore { .. }
                | Self::WriteBackDenied { .. }
                | Self::Config(_)
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::StoreNotFound { .. } => {
                Some("Check the profile path; it must contain a History file")
            }
            Self::StoreUnreadable { .. } => {
                Some("The history file looks corrupt or is not a Chrome history database")
            }
            Self::SameStore { .. } => Some("Pass two different Chrome profiles"),
            Self::WriteBackDenied { .. } => {
                Some("Is Chrome running? Please close Chrome and try again")
            }
            _ => None,
        }
    }

    /// Build a `StoreUnreadable` error from any displayable cause.
    #[must_use]
    pub fn unreadable(
        side: StoreSide,
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::StoreUnreadable {
            side,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type using `ChromemateError`.
pub type Result<T> = std::result::Result<T, ChromemateError>;
