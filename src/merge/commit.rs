//! Replacing the real target store with the merged working copy.

use crate::error::{ChromemateError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Windows `ERROR_SHARING_VIOLATION`.
const ERROR_SHARING_VIOLATION: i32 = 32;
/// Windows `ERROR_LOCK_VIOLATION`.
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Atomically replace `target` with the contents of `merged`.
///
/// The target must be writable in place. The bytes go to a temp file next to
/// the target, are synced and hashed again, take over the target's
/// permissions, and are renamed into place. The rename is the only step that
/// touches the target, so any failure leaves it exactly as it was.
///
/// # Errors
///
/// Returns `WriteBackDenied` when the target is locked or not writable,
/// `WriteBackFailed` for any other I/O failure.
pub fn write_back(merged: &Path, target: &Path) -> Result<()> {
    let temp_path = temp_path_for(target);

    if let Err(err) = replace_file(merged, target, &temp_path) {
        remove_temp_file(&temp_path);
        return Err(write_back_error(target, err));
    }

    tracing::info!(path = %target.display(), "Wrote merged history back");
    Ok(())
}

/// Sort a write-back I/O failure into denied (retry after closing the
/// browser) or failed.
#[must_use]
pub fn write_back_error(path: &Path, source: io::Error) -> ChromemateError {
    let path = path.to_path_buf();
    if is_access_denied(&source) {
        ChromemateError::WriteBackDenied { path, source }
    } else {
        ChromemateError::WriteBackFailed { path, source }
    }
}

fn is_access_denied(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    cfg!(windows)
        && matches!(
            err.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
        )
}

fn remove_temp_file(path: &Path) {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove temp file");
        }
        _ => {}
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "History".into(), |n| n.to_string_lossy().into_owned());
    target.with_file_name(format!(".{name}.chromemate.tmp"))
}

fn replace_file(merged: &Path, target: &Path, temp_path: &Path) -> io::Result<()> {
    let permissions = fs::metadata(target)?.permissions();
    // A rename succeeds on a read-only or locked file; opening it does not.
    OpenOptions::new().write(true).open(target)?;

    let expected = {
        let mut reader = BufReader::new(File::open(merged)?);
        let mut writer = BufWriter::new(File::create(temp_path)?);
        let hash = copy_hashing(&mut reader, &mut writer)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .sync_all()?;
        hash
    };
    let written = hash_file(temp_path)?;
    if written != expected {
        return Err(io::Error::other(format!(
            "checksum mismatch in staged write-back: expected {expected}, found {written}"
        )));
    }
    fs::set_permissions(temp_path, permissions)?;

    fs::rename(temp_path, target)
}

fn copy_hashing<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> io::Result<String> {
    copy_hashing(&mut BufReader::new(File::open(path)?), &mut io::sink())
}
