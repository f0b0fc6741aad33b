//! Core data types for `chromemate`.
//!
//! This module defines the records and statistics the merge engine works with:
//! - `UrlRecord` - One canonical URL with aggregate counters
//! - `VisitRecord` - One visit event referencing a `UrlRecord`
//! - `UrlTotals` - The target-side counters a merge folds source rows into
//! - `UrlIdMapping` - Per-merge translation of source URL ids to target ids
//! - `MergeStats` / `MergePreview` - Plain outputs handed back to callers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which of the two stores an operation or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSide {
    Source,
    Target,
}

impl StoreSide {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }

    /// File name used for this side inside a working-copy directory.
    #[must_use]
    pub const fn working_copy_name(&self) -> &'static str {
        match self {
            Self::Source => "source_history.db",
            Self::Target => "target_history.db",
        }
    }
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Target => write!(f, "Target"),
        }
    }
}

/// A row of the `urls` table.
///
/// Timestamps are store-native: microseconds since 1601-01-01 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    /// NULL in the store stays `None`.
    pub title: Option<String>,
    pub visit_count: i64,
    pub typed_count: i64,
    pub last_visit_time: i64,
    pub hidden: bool,
}

/// A row of the `visits` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub url_id: i64,
    pub visit_time: i64,
    /// Id of the referring visit, 0 when there is none.
    pub from_visit: i64,
    pub transition: i64,
    pub segment_id: i64,
    pub visit_duration: i64,
    pub incremented_omnibox_typed_score: bool,
    pub consider_for_ntp_most_visited: bool,
}

/// Target-side counters for one URL, keyed by URL string during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlTotals {
    pub id: i64,
    pub visit_count: i64,
    pub typed_count: i64,
    pub last_visit_time: i64,
}

impl UrlTotals {
    /// Totals for a freshly inserted record.
    #[must_use]
    pub const fn for_inserted(id: i64, record: &UrlRecord) -> Self {
        Self {
            id,
            visit_count: record.visit_count,
            typed_count: record.typed_count,
            last_visit_time: record.last_visit_time,
        }
    }

    /// Fold a source record's counters into these totals.
    ///
    /// Counts are summed, `last_visit_time` keeps the later of the two.
    pub fn absorb(&mut self, record: &UrlRecord) {
        self.visit_count = self.visit_count.saturating_add(record.visit_count);
        self.typed_count = self.typed_count.saturating_add(record.typed_count);
        self.last_visit_time = self.last_visit_time.max(record.last_visit_time);
    }
}

/// Translation table from source URL ids to target URL ids.
///
/// The two stores assign ids independently; visits copied from the source
/// are re-pointed through this table and never carry a source id.
#[derive(Debug, Clone, Default)]
pub struct UrlIdMapping {
    ids: HashMap<i64, i64>,
}

impl UrlIdMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: i64, target_id: i64) {
        self.ids.insert(source_id, target_id);
    }

    /// Target id for a source URL id, `None` if that URL was never migrated.
    #[must_use]
    pub fn resolve(&self, source_id: i64) -> Option<i64> {
        self.ids.get(&source_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Statistics from a history merge operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub urls_added: usize,
    pub urls_updated: usize,
    pub visits_added: usize,
    /// Reserved; always 0.
    pub urls_skipped: usize,
}

impl MergeStats {
    /// True when the target working copy differs from the real target.
    ///
    /// Visits are only ever added to migrated URLs, so URL changes alone
    /// decide whether a write-back is needed.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.urls_added > 0 || self.urls_updated > 0
    }
}

/// What a merge would do, computed without touching either store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePreview {
    pub source_urls: usize,
    pub source_visits: usize,
    pub target_urls: usize,
    pub target_visits: usize,
    pub new_urls_to_add: usize,
    pub existing_urls_to_update: usize,
}

impl MergePreview {
    #[must_use]
    pub const fn nothing_to_merge(&self) -> bool {
        self.new_urls_to_add == 0 && self.existing_urls_to_update == 0
    }
}
