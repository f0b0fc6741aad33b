//! `SQLite` access to one Chrome history store.
//!
//! `HistoryStore` only reads and writes rows; merge logic lives in
//! [`crate::merge`]. Read failures are reported as `StoreUnreadable` for the
//! store's side, never swallowed into empty results.

use crate::error::{ChromemateError, Result};
use crate::model::{StoreSide, UrlRecord, UrlTotals, VisitRecord};
use crate::storage::schema::check_history_schema;
use rusqlite::{Connection, OpenFlags, Row, Transaction, TransactionBehavior, params};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SELECT_VISITED_URLS: &str = "SELECT id, url, title, visit_count, typed_count, last_visit_time, hidden
     FROM urls
     WHERE visit_count > 0
     ORDER BY id";

const SELECT_VISITS: &str = "SELECT url, visit_time, from_visit, transition, segment_id,
            visit_duration, incremented_omnibox_typed_score,
            consider_for_ntp_most_visited
     FROM visits
     ORDER BY id";

/// Deduplication key for visits: (url id, visit time).
pub type VisitKey = (i64, i64);

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Connection settings applied when opening a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u64>,
    /// Run `PRAGMA quick_check` before trusting the file.
    pub integrity_check: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: None,
            integrity_check: true,
        }
    }
}

/// An open history store (`urls` + `visits`).
#[derive(Debug)]
pub struct HistoryStore {
    conn: Connection,
    side: StoreSide,
    path: PathBuf,
}

impl HistoryStore {
    /// Open an existing store and verify it looks like Chrome history.
    ///
    /// The file is never created.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the file cannot be opened, fails the
    /// integrity check, or lacks the `urls`/`visits` columns the engine uses.
    pub fn open(
        path: &Path,
        side: StoreSide,
        mode: AccessMode,
        options: StoreOptions,
    ) -> Result<Self> {
        Self::open_as(path, path, side, mode, options)
    }

    /// Open `file` but report errors against `reported_path`.
    ///
    /// Used for working copies, whose temporary location means nothing to
    /// the user.
    ///
    /// # Errors
    ///
    /// Same as [`HistoryStore::open`].
    pub fn open_as(
        file: &Path,
        reported_path: &Path,
        side: StoreSide,
        mode: AccessMode,
        options: StoreOptions,
    ) -> Result<Self> {
        let flags = match mode {
            AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            AccessMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(file, flags)
            .map_err(|e| ChromemateError::unreadable(side, reported_path, e))?;
        if let Some(timeout) = options.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }

        let store = Self {
            conn,
            side,
            path: reported_path.to_path_buf(),
        };

        if options.integrity_check {
            store.quick_check()?;
        }
        check_history_schema(&store.conn).map_err(|e| store.unreadable(e))?;

        tracing::debug!(
            side = side.as_str(),
            path = %file.display(),
            ?mode,
            "Opened history store"
        );
        Ok(store)
    }

    fn unreadable(&self, reason: impl std::fmt::Display) -> ChromemateError {
        ChromemateError::unreadable(self.side, &self.path, reason)
    }

    fn quick_check(&self) -> Result<()> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| self.unreadable(e))?;
        if verdict.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(self.unreadable(format!("integrity check failed: {verdict}")))
        }
    }

    /// Number of URLs with at least one visit.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn count_visited_urls(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM urls WHERE visit_count > 0")
    }

    /// Number of visit rows.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn count_visits(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM visits")
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| self.unreadable(e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Every URL string in the store, visited or not.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn url_set(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM urls WHERE url IS NOT NULL")
            .map_err(|e| self.unreadable(e))?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(Iterator::collect)
            .map_err(|e| self.unreadable(e))?;
        Ok(urls)
    }

    /// URL strings of records with at least one visit, in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn visited_url_strings(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM urls WHERE visit_count > 0 ORDER BY id")
            .map_err(|e| self.unreadable(e))?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(Iterator::collect)
            .map_err(|e| self.unreadable(e))?;
        Ok(urls)
    }

    /// Stream URL records with `visit_count > 0` in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails, or whatever `f` returns.
    pub fn for_each_visited_url<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(UrlRecord) -> Result<()>,
    {
        let mut stmt = self
            .conn
            .prepare(SELECT_VISITED_URLS)
            .map_err(|e| self.unreadable(e))?;
        let mut rows = stmt.query([]).map_err(|e| self.unreadable(e))?;
        while let Some(row) = rows.next().map_err(|e| self.unreadable(e))? {
            let record = url_from_row(row).map_err(|e| self.unreadable(e))?;
            f(record)?;
        }
        Ok(())
    }

    /// Stream every visit record in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails, or whatever `f` returns.
    pub fn for_each_visit<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(VisitRecord) -> Result<()>,
    {
        let mut stmt = self
            .conn
            .prepare(SELECT_VISITS)
            .map_err(|e| self.unreadable(e))?;
        let mut rows = stmt.query([]).map_err(|e| self.unreadable(e))?;
        while let Some(row) = rows.next().map_err(|e| self.unreadable(e))? {
            let visit = visit_from_row(row).map_err(|e| self.unreadable(e))?;
            f(visit)?;
        }
        Ok(())
    }

    /// Run `f` inside one immediate transaction; commits only if `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or committed, or
    /// if `f` fails (the transaction is rolled back).
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&StoreWriter<'_>) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let writer = StoreWriter {
            tx: &tx,
            side: self.side,
            path: &self.path,
        };

        let result = f(&writer)?;

        tx.commit()?;
        tracing::debug!(op, side = self.side.as_str(), "Committed store transaction");

        Ok(result)
    }

    /// Close the connection, surfacing any error from finalizing it.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` fails to close the handle.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| ChromemateError::Database(e))
    }
}

/// Write access to a store inside a [`HistoryStore::mutate`] transaction.
pub struct StoreWriter<'a> {
    tx: &'a Transaction<'a>,
    side: StoreSide,
    path: &'a Path,
}

impl StoreWriter<'_> {
    fn unreadable(&self, reason: impl std::fmt::Display) -> ChromemateError {
        ChromemateError::unreadable(self.side, self.path, reason)
    }

    /// Current counters of every URL keyed by URL string.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn url_totals_by_url(&self) -> Result<HashMap<String, UrlTotals>> {
        let mut stmt = self
            .tx
            .prepare(
                "SELECT id, url, visit_count, typed_count, last_visit_time
                 FROM urls
                 WHERE url IS NOT NULL",
            )
            .map_err(|e| self.unreadable(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    UrlTotals {
                        id: row.get(0)?,
                        visit_count: row.get(2)?,
                        typed_count: row.get(3)?,
                        last_visit_time: row.get(4)?,
                    },
                ))
            })
            .and_then(Iterator::collect)
            .map_err(|e| self.unreadable(e))?;
        Ok(rows)
    }

    /// Existing `(url id, visit time)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnreadable` if the query fails.
    pub fn visit_keys(&self) -> Result<HashSet<VisitKey>> {
        let mut stmt = self
            .tx
            .prepare("SELECT url, visit_time FROM visits")
            .map_err(|e| self.unreadable(e))?;
        let keys = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .and_then(Iterator::collect)
            .map_err(|e| self.unreadable(e))?;
        Ok(keys)
    }

    /// Overwrite the counters of an existing URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_url_totals(&self, totals: &UrlTotals) -> Result<()> {
        self.tx.execute(
            "UPDATE urls
             SET visit_count = ?, typed_count = ?, last_visit_time = ?
             WHERE id = ?",
            params![
                totals.visit_count,
                totals.typed_count,
                totals.last_visit_time,
                totals.id
            ],
        )?;
        Ok(())
    }

    /// Insert a URL; the store assigns its id, which is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_url(&self, record: &UrlRecord) -> Result<i64> {
        self.tx.execute(
            "INSERT INTO urls (url, title, visit_count, typed_count, last_visit_time, hidden)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.url,
                record.title,
                record.visit_count,
                record.typed_count,
                record.last_visit_time,
                record.hidden
            ],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Insert a visit as given; the caller has already re-pointed `url_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_visit(&self, visit: &VisitRecord) -> Result<()> {
        self.tx.execute(
            "INSERT INTO visits (
                url, visit_time, from_visit, transition, segment_id,
                visit_duration, incremented_omnibox_typed_score,
                consider_for_ntp_most_visited
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                visit.url_id,
                visit.visit_time,
                visit.from_visit,
                visit.transition,
                visit.segment_id,
                visit.visit_duration,
                visit.incremented_omnibox_typed_score,
                visit.consider_for_ntp_most_visited
            ],
        )?;
        Ok(())
    }
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        visit_count: row.get(3)?,
        typed_count: row.get(4)?,
        last_visit_time: row.get(5)?,
        hidden: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
    })
}

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<VisitRecord> {
    Ok(VisitRecord {
        url_id: row.get(0)?,
        visit_time: row.get(1)?,
        from_visit: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        transition: row.get(3)?,
        segment_id: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        visit_duration: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        incremented_omnibox_typed_score: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
        consider_for_ntp_most_visited: row.get::<_, Option<bool>>(7)?.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::create_history_schema;
    use std::fs;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("History");
        let conn = Connection::open(&path).unwrap();
        create_history_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO urls (id, url, title, visit_count, typed_count, last_visit_time, hidden)
             VALUES (1, 'https://a.example', 'A', 3, 1, 100, 0),
                    (2, 'https://b.example', NULL, 0, 0, 50, 1);
             INSERT INTO visits (url, visit_time, transition, segment_id)
             VALUES (1, 90, 1, NULL), (1, 100, 0, 4);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_reads_visited_urls_and_visits() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir);
        let store = HistoryStore::open(
            &path,
            StoreSide::Source,
            AccessMode::ReadOnly,
            StoreOptions::default(),
        )
        .unwrap();

        assert_eq!(store.count_visited_urls().unwrap(), 1);
        assert_eq!(store.count_visits().unwrap(), 2);
        assert_eq!(store.url_set().unwrap().len(), 2);
        assert_eq!(store.visited_url_strings().unwrap(), vec!["https://a.example"]);

        let mut urls = Vec::new();
        store
            .for_each_visited_url(|record| {
                urls.push(record);
                Ok(())
            })
            .unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].title.as_deref(), Some("A"));

        let mut visits = Vec::new();
        store
            .for_each_visit(|visit| {
                visits.push(visit);
                Ok(())
            })
            .unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].segment_id, 0, "NULL segment_id defaults to zero");
        assert_eq!(visits[1].segment_id, 4);
        store.close().unwrap();
    }

    #[test]
    fn test_mutate_commits_and_assigns_ids() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir);
        let mut store = HistoryStore::open(
            &path,
            StoreSide::Target,
            AccessMode::ReadWrite,
            StoreOptions::default(),
        )
        .unwrap();

        let new_id = store
            .mutate("test_insert", |writer| {
                let totals = writer.url_totals_by_url()?;
                assert_eq!(totals["https://a.example"].visit_count, 3);
                assert_eq!(writer.visit_keys()?.len(), 2);

                writer.insert_url(&UrlRecord {
                    id: 0,
                    url: "https://c.example".into(),
                    title: Some("C".into()),
                    visit_count: 1,
                    typed_count: 0,
                    last_visit_time: 10,
                    hidden: false,
                })
            })
            .unwrap();
        assert_eq!(new_id, 3);
        assert_eq!(store.count_visited_urls().unwrap(), 2);
    }

    #[test]
    fn test_mutate_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let path = seeded_store(&dir);
        let mut store = HistoryStore::open(
            &path,
            StoreSide::Target,
            AccessMode::ReadWrite,
            StoreOptions::default(),
        )
        .unwrap();

        let result: Result<()> = store.mutate("test_rollback", |writer| {
            writer.update_url_totals(&UrlTotals {
                id: 1,
                visit_count: 999,
                typed_count: 0,
                last_visit_time: 0,
            })?;
            Err(ChromemateError::Config("abort".into()))
        });
        assert!(result.is_err());

        let visited: i64 = store
            .conn
            .query_row("SELECT visit_count FROM urls WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(visited, 3);
    }

    #[test]
    fn test_open_rejects_non_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("History");
        fs::write(&path, b"this is definitely not sqlite, just some bytes").unwrap();

        let err = HistoryStore::open(
            &path,
            StoreSide::Target,
            AccessMode::ReadOnly,
            StoreOptions::default(),
        )
        .unwrap_err();
        assert!(
            matches!(
                err,
                ChromemateError::StoreUnreadable {
                    side: StoreSide::Target,
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn test_open_rejects_wrong_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("History");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE bookmarks (id INTEGER PRIMARY KEY)")
            .unwrap();
        drop(conn);

        let err = HistoryStore::open(
            &path,
            StoreSide::Source,
            AccessMode::ReadOnly,
            StoreOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing table 'urls'"), "{err}");
    }

    #[test]
    fn test_open_never_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("History");

        let result = HistoryStore::open(
            &path,
            StoreSide::Target,
            AccessMode::ReadWrite,
            StoreOptions::default(),
        );
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
