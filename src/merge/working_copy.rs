//! Disposable working copies of the two stores.
//!
//! Browsers keep their history file open, so the engine never queries the
//! real files. Both are copied into a private temporary directory that is
//! removed when [`WorkingCopies`] is dropped or discarded.

use crate::error::{ChromemateError, Result};
use crate::model::StoreSide;
use crate::storage::{AccessMode, HistoryStore, StoreOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORK_DIR_PREFIX: &str = "chromemate-";

/// One staged copy: where it lives now and which file it came from.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    pub side: StoreSide,
    pub original: PathBuf,
    pub path: PathBuf,
}

impl WorkingCopy {
    /// Open the copy, reporting errors against the original file.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the copy is not a usable history store.
    pub fn open(&self, mode: AccessMode, options: StoreOptions) -> Result<HistoryStore> {
        HistoryStore::open_as(&self.path, &self.original, self.side, mode, options)
    }
}

/// Scoped pair of working copies.
#[derive(Debug)]
pub struct WorkingCopies {
    dir: TempDir,
    source: WorkingCopy,
    target: WorkingCopy,
}

impl WorkingCopies {
    /// Copy both stores into a fresh temporary directory.
    ///
    /// Both paths are checked before anything is created, so a missing store
    /// never leaves a directory behind.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` for a missing store, `StoreUnreadable` if a
    /// store cannot be copied, or `Io` if the directory cannot be created.
    pub fn stage(source: &Path, target: &Path, work_dir: Option<&Path>) -> Result<Self> {
        require_store(source, StoreSide::Source)?;
        require_store(target, StoreSide::Target)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);
        let dir = match work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        let source = copy_into(&dir, source, StoreSide::Source)?;
        let target = copy_into(&dir, target, StoreSide::Target)?;

        tracing::debug!(dir = %dir.path().display(), "Staged working copies");
        Ok(Self {
            dir,
            source,
            target,
        })
    }

    #[must_use]
    pub const fn source(&self) -> &WorkingCopy {
        &self.source
    }

    #[must_use]
    pub const fn target(&self) -> &WorkingCopy {
        &self.target
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, surfacing any error instead of ignoring it
    /// as `Drop` would.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn discard(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(dir = %path.display(), "Removed working copies");
        Ok(())
    }
}

fn require_store(path: &Path, side: StoreSide) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ChromemateError::StoreNotFound {
            side,
            path: path.to_path_buf(),
        })
    }
}

fn copy_into(dir: &TempDir, original: &Path, side: StoreSide) -> Result<WorkingCopy> {
    let path = dir.path().join(side.working_copy_name());
    fs::copy(original, &path).map_err(|e| ChromemateError::unreadable(side, original, e))?;
    Ok(WorkingCopy {
        side,
        original: original.to_path_buf(),
        path,
    })
}
