//! `chromemate`: merge one Chrome browsing history into another.
//!
//! The engine copies both history stores aside, folds the source into the
//! target copy, and atomically replaces the real target only when something
//! changed. See [`merge::HistoryMerger`].

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod merge;
pub mod model;
pub mod storage;

pub use error::{ChromemateError, ErrorCode, Result, StructuredError};
pub use merge::{HistoryMerger, MergeOptions, MergeOutcome, MergePhase};
pub use model::{MergePreview, MergeStats, StoreSide};
