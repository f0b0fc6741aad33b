//! History merge engine.
//!
//! [`HistoryMerger`] drives one merge from start to finish:
//!
//! 1. Resolve both paths and stage working copies ([`working_copy`])
//! 2. Fold the source copy into the target copy ([`planner`])
//! 3. Replace the real target when something changed ([`commit`])
//!
//! [`HistoryMerger::preview`] runs the read-only counterpart ([`preview`]).
//! The real source store is never written, and the real target only through
//! an atomic rename.

pub mod commit;
pub mod planner;
pub mod preview;
pub mod working_copy;

use crate::error::{ChromemateError, Result};
use crate::model::{MergePreview, MergeStats};
use crate::storage::{AccessMode, StoreOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use working_copy::WorkingCopies;

/// File name of the history store inside a Chrome profile directory.
pub const DEFAULT_STORE_FILE: &str = "History";

/// Engine settings, usually resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Store file looked up when a path names a profile directory.
    pub store_file: String,
    /// `SQLite` busy timeout for working-copy connections.
    pub lock_timeout_ms: Option<u64>,
    /// Run `PRAGMA quick_check` on both working copies.
    pub integrity_check: bool,
    /// Parent of the temporary working-copy directory.
    pub work_dir: Option<PathBuf>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            store_file: DEFAULT_STORE_FILE.to_string(),
            lock_timeout_ms: None,
            integrity_check: true,
            work_dir: None,
        }
    }
}

impl MergeOptions {
    const fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout_ms: self.lock_timeout_ms,
            integrity_check: self.integrity_check,
        }
    }
}

/// A profile directory resolves to the store file inside it.
#[must_use]
pub fn resolve_store_path(path: &Path, store_file: &str) -> PathBuf {
    if path.is_dir() {
        path.join(store_file)
    } else {
        path.to_path_buf()
    }
}

/// Refuse to merge a store into itself.
///
/// Paths that do not exist yet are left to the existence checks made when
/// staging.
///
/// # Errors
///
/// Returns `SameStore` when both paths name the same file.
pub fn ensure_distinct_stores(source: &Path, target: &Path) -> Result<()> {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(source), Ok(target)) if source == target => {
            Err(ChromemateError::SameStore { path: target })
        }
        _ => Ok(()),
    }
}

/// Lifecycle of one merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    Staged,
    Merging,
    /// Live run finished; the target was replaced if anything changed.
    Committed,
    /// Dry run finished; the target was not touched.
    PreviewOnly,
    Failed,
}

impl MergePhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::PreviewOnly | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Staged, Self::Merging | Self::Failed)
                | (
                    Self::Merging,
                    Self::Committed | Self::PreviewOnly | Self::Failed
                )
        )
    }
}

impl fmt::Display for MergePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Staged => "staged",
            Self::Merging => "merging",
            Self::Committed => "committed",
            Self::PreviewOnly => "preview_only",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct PhaseTracker {
    phase: MergePhase,
}

impl PhaseTracker {
    const fn new() -> Self {
        Self {
            phase: MergePhase::Staged,
        }
    }

    fn advance(&mut self, next: MergePhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid merge transition {} -> {next}",
            self.phase
        );
        if !self.phase.can_transition_to(next) {
            tracing::error!(from = %self.phase, to = %next, "Invalid merge phase transition");
            return;
        }
        tracing::debug!(from = %self.phase, to = %next, "Merge phase transition");
        self.phase = next;
    }
}

/// Result of [`HistoryMerger::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub stats: MergeStats,
    pub phase: MergePhase,
    /// True only if the real target file was replaced.
    pub wrote_back: bool,
}

/// Merges one history store into another.
///
/// Merging is not idempotent: running the same merge twice adds the source's
/// visit and typed counts to the target again.
#[derive(Debug, Clone)]
pub struct HistoryMerger {
    source: PathBuf,
    target: PathBuf,
    dry_run: bool,
    options: MergeOptions,
}

impl HistoryMerger {
    /// `source` and `target` may each be a store file or a profile directory.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            dry_run: false,
            options: MergeOptions::default(),
        }
    }

    /// Merge into the working copy only; the real target is left alone.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the merge and return its statistics.
    ///
    /// # Errors
    ///
    /// See [`HistoryMerger::run`].
    pub fn merge(&self) -> Result<MergeStats> {
        self.run().map(|outcome| outcome.stats)
    }

    /// Run the merge and report how it ended.
    ///
    /// # Errors
    ///
    /// Returns `SameStore` or `StoreNotFound` before anything is staged,
    /// `StoreUnreadable` for a corrupt or foreign store, and
    /// `WriteBackDenied`/`WriteBackFailed` if the target cannot be replaced.
    /// Working copies are removed in every case.
    pub fn run(&self) -> Result<MergeOutcome> {
        let (source, target) = self.store_paths()?;

        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            dry_run = self.dry_run,
            "Starting history merge"
        );

        let copies = WorkingCopies::stage(&source, &target, self.options.work_dir.as_deref())?;
        let mut tracker = PhaseTracker::new();

        match self.merge_staged(&copies, &target, &mut tracker) {
            Ok((stats, wrote_back)) => {
                discard(copies);
                Ok(MergeOutcome {
                    stats,
                    phase: tracker.phase,
                    wrote_back,
                })
            }
            Err(err) => {
                tracker.advance(MergePhase::Failed);
                tracing::warn!(error = %err, "History merge failed");
                discard(copies);
                Err(err)
            }
        }
    }

    fn store_paths(&self) -> Result<(PathBuf, PathBuf)> {
        let source = resolve_store_path(&self.source, &self.options.store_file);
        let target = resolve_store_path(&self.target, &self.options.store_file);
        ensure_distinct_stores(&source, &target)?;
        Ok((source, target))
    }

    fn merge_staged(
        &self,
        copies: &WorkingCopies,
        target: &Path,
        tracker: &mut PhaseTracker,
    ) -> Result<(MergeStats, bool)> {
        let store_options = self.options.store_options();
        let source_store = copies.source().open(AccessMode::ReadOnly, store_options)?;
        let mut target_store = copies.target().open(AccessMode::ReadWrite, store_options)?;

        tracker.advance(MergePhase::Merging);
        let stats = planner::execute_merge(&source_store, &mut target_store)?;
        source_store.close()?;
        target_store.close()?;

        if self.dry_run {
            tracker.advance(MergePhase::PreviewOnly);
            return Ok((stats, false));
        }

        let wrote_back = if stats.has_changes() {
            commit::write_back(&copies.target().path, target)?;
            true
        } else {
            tracing::info!("Nothing to write back");
            false
        };
        tracker.advance(MergePhase::Committed);
        Ok((stats, wrote_back))
    }

    /// Count what [`HistoryMerger::merge`] would change, without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns `SameStore`, `StoreNotFound` or `StoreUnreadable` as for a
    /// merge.
    pub fn preview(&self) -> Result<MergePreview> {
        let (source, target) = self.store_paths()?;

        let copies = WorkingCopies::stage(&source, &target, self.options.work_dir.as_deref())?;
        let result = self.preview_staged(&copies);
        discard(copies);
        result
    }

    fn preview_staged(&self, copies: &WorkingCopies) -> Result<MergePreview> {
        let store_options = self.options.store_options();
        let source_store = copies.source().open(AccessMode::ReadOnly, store_options)?;
        let target_store = copies.target().open(AccessMode::ReadOnly, store_options)?;
        preview::compute_preview(&source_store, &target_store)
    }
}

fn discard(copies: WorkingCopies) {
    if let Err(err) = copies.discard() {
        tracing::warn!(error = %err, "Failed to remove working copies");
    }
}
