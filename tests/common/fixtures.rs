//! Chrome-shaped history databases for tests.

use chromemate::storage::schema::create_history_schema;
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One `urls` row: (id, url, title, visit_count, typed_count, last_visit_time, hidden).
pub type UrlRow = (i64, String, String, i64, i64, i64, bool);

/// One `visits` row: (url id, visit time, transition).
pub type VisitRow = (i64, i64, i64);

/// Builder for a history store with known contents.
#[derive(Debug, Clone, Default)]
pub struct HistoryFixture {
    pub urls: Vec<UrlRow>,
    pub visits: Vec<VisitRow>,
}

impl HistoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(
        mut self,
        id: i64,
        url: &str,
        title: &str,
        visit_count: i64,
        typed_count: i64,
        last_visit_time: i64,
    ) -> Self {
        self.urls.push((
            id,
            url.to_string(),
            title.to_string(),
            visit_count,
            typed_count,
            last_visit_time,
            false,
        ));
        self
    }

    pub fn visit(mut self, url_id: i64, visit_time: i64) -> Self {
        self.visits.push((url_id, visit_time, 0));
        self
    }

    /// Write the store to `path`, creating parent directories.
    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create profile dir");
        }
        let conn = Connection::open(path).expect("open fixture db");
        create_history_schema(&conn).expect("create schema");
        for (id, url, title, visit_count, typed_count, last_visit_time, hidden) in &self.urls {
            conn.execute(
                "INSERT INTO urls (id, url, title, visit_count, typed_count, last_visit_time, hidden)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![id, url, title, visit_count, typed_count, last_visit_time, hidden],
            )
            .expect("insert url");
        }
        for (url_id, visit_time, transition) in &self.visits {
            conn.execute(
                "INSERT INTO visits (url, visit_time, transition) VALUES (?, ?, ?)",
                params![url_id, visit_time, transition],
            )
            .expect("insert visit");
        }
        conn.close().expect("close fixture db");
    }

    /// Write the store as `<dir>/History` and return the directory.
    pub fn write_profile(&self, root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        self.write(&dir.join("History"));
        dir
    }
}

/// Source profile of the reference scenario: github, stackoverflow,
/// unique-source, four visits.
pub fn scenario_source() -> HistoryFixture {
    HistoryFixture::new()
        .url(1, "https://github.com", "GitHub", 100, 10, 13_345_678_901_234_567)
        .url(2, "https://stackoverflow.com", "Stack Overflow", 50, 5, 13_345_678_901_234_568)
        .url(3, "https://unique-source.com", "Unique Source", 25, 2, 13_345_678_901_234_569)
        .visit(1, 13_345_678_901_234_567)
        .visit(1, 13_345_678_901_234_568)
        .visit(2, 13_345_678_901_234_569)
        .visit(3, 13_345_678_901_234_570)
}

/// Target profile of the reference scenario: github, google, two visits.
pub fn scenario_target() -> HistoryFixture {
    HistoryFixture::new()
        .url(1, "https://github.com", "GitHub - Home", 200, 20, 13_345_678_901_234_600)
        .url(2, "https://google.com", "Google", 300, 30, 13_345_678_901_234_601)
        .visit(1, 13_345_678_901_234_600)
        .visit(2, 13_345_678_901_234_601)
}

/// A temp root holding a `Source` and a `Target` profile directory.
pub struct Profiles {
    pub root: TempDir,
    pub source: PathBuf,
    pub target: PathBuf,
}

impl Profiles {
    pub fn new(source: &HistoryFixture, target: &HistoryFixture) -> Self {
        let root = TempDir::new().expect("temp dir");
        let source = source.write_profile(root.path(), "Source");
        let target = target.write_profile(root.path(), "Target");
        Self {
            root,
            source,
            target,
        }
    }

    pub fn target_store(&self) -> PathBuf {
        self.target.join("History")
    }

    pub fn source_store(&self) -> PathBuf {
        self.source.join("History")
    }

    /// Fresh empty directory under the root, for working copies.
    pub fn work_dir(&self) -> PathBuf {
        let dir = self.root.path().join("work");
        fs::create_dir_all(&dir).expect("create work dir");
        dir
    }
}

pub fn scenario_profiles() -> Profiles {
    Profiles::new(&scenario_source(), &scenario_target())
}

/// (visit_count, typed_count, last_visit_time) of a URL, if present.
pub fn url_counts(store: &Path, url: &str) -> Option<(i64, i64, i64)> {
    let conn = Connection::open(store).expect("open store");
    conn.query_row(
        "SELECT visit_count, typed_count, last_visit_time FROM urls WHERE url = ?",
        [url],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .ok()
}

pub fn row_count(store: &Path, table: &str) -> i64 {
    let conn = Connection::open(store).expect("open store");
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

pub fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).expect("read dir").next().is_none()
}
