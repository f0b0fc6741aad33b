//! Chrome history schema: the columns the merge engine relies on, and a DDL
//! script that creates a minimal store with that shape.

use rusqlite::{Connection, Result};
use std::fmt;

/// Columns of `urls` read or written by the merge engine.
pub const URL_COLUMNS: &[&str] = &[
    "id",
    "url",
    "title",
    "visit_count",
    "typed_count",
    "last_visit_time",
    "hidden",
];

/// Columns of `visits` read or written by the merge engine.
pub const VISIT_COLUMNS: &[&str] = &[
    "id",
    "url",
    "visit_time",
    "from_visit",
    "transition",
    "segment_id",
    "visit_duration",
    "incremented_omnibox_typed_score",
    "consider_for_ntp_most_visited",
];

/// Minimal Chrome-compatible history schema.
///
/// Real Chrome stores carry more tables and columns; every column not listed
/// here has a default, so rows inserted by the engine stay valid there too.
pub const HISTORY_SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url LONGVARCHAR,
        title LONGVARCHAR,
        visit_count INTEGER DEFAULT 0 NOT NULL,
        typed_count INTEGER DEFAULT 0 NOT NULL,
        last_visit_time INTEGER NOT NULL,
        hidden INTEGER DEFAULT 0 NOT NULL
    );
    CREATE INDEX IF NOT EXISTS urls_url_index ON urls (url);

    CREATE TABLE IF NOT EXISTS visits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url INTEGER NOT NULL,
        visit_time INTEGER NOT NULL,
        from_visit INTEGER DEFAULT 0,
        transition INTEGER DEFAULT 0 NOT NULL,
        segment_id INTEGER DEFAULT 0,
        visit_duration INTEGER DEFAULT 0 NOT NULL,
        incremented_omnibox_typed_score BOOLEAN DEFAULT FALSE NOT NULL,
        consider_for_ntp_most_visited BOOLEAN DEFAULT FALSE NOT NULL
    );
    CREATE INDEX IF NOT EXISTS visits_url_index ON visits (url);
    CREATE INDEX IF NOT EXISTS visits_time_index ON visits (visit_time);
";

/// Create the history tables. Idempotent.
///
/// # Errors
///
/// Returns an error if the SQL execution fails.
pub fn create_history_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(HISTORY_SCHEMA_SQL)
}

/// Why a database does not look like a Chrome history store.
#[derive(Debug)]
pub enum SchemaProblem {
    MissingTable(&'static str),
    MissingColumns {
        table: &'static str,
        columns: Vec<&'static str>,
    },
    Query(rusqlite::Error),
}

impl fmt::Display for SchemaProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable(table) => write!(f, "missing table '{table}'"),
            Self::MissingColumns { table, columns } => {
                write!(f, "table '{table}' lacks column(s): {}", columns.join(", "))
            }
            Self::Query(err) => write!(f, "{err}"),
        }
    }
}

impl From<rusqlite::Error> for SchemaProblem {
    fn from(err: rusqlite::Error) -> Self {
        Self::Query(err)
    }
}

/// Verify both tables exist with every column the engine touches.
///
/// # Errors
///
/// Returns the first problem found.
pub fn check_history_schema(conn: &Connection) -> std::result::Result<(), SchemaProblem> {
    check_table(conn, "urls", URL_COLUMNS)?;
    check_table(conn, "visits", VISIT_COLUMNS)?;
    Ok(())
}

fn check_table(
    conn: &Connection,
    table: &'static str,
    required: &[&'static str],
) -> std::result::Result<(), SchemaProblem> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let present = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;

    if present.is_empty() {
        return Err(SchemaProblem::MissingTable(table));
    }

    let missing: Vec<&'static str> = required
        .iter()
        .copied()
        .filter(|column| !present.iter().any(|name| name.eq_ignore_ascii_case(column)))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaProblem::MissingColumns {
            table,
            columns: missing,
        })
    }
}
