//! SQLite storage backend.
//!
//! Two tables:
//! - `counters`: primary key `(item_id, duration)`
//! - `annotations`: primary key `detail_id`
//!
//! Counter writes are single `INSERT ... ON CONFLICT` statements, so concurrent
//! increments do not lose updates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::traits::{AnnotationStore, BackendKind, CounterStore, MAX_COUNT, Storage, clamp_count};
use crate::domain::{Annotation, DurationBucket, NewAnnotation};
use crate::error::{PlanboardError, Result};
use crate::id::now_ms;
use crate::seed::seed_value;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "planboard.db";

/// Columns added after the first release; applied when missing.
const ADDITIVE_COLUMNS: [(&str, &str, &str); 2] = [
    ("annotations", "phase_title", "TEXT"),
    ("annotations", "allowed_durations", "TEXT"),
];

/// SQLite-backed storage.
///
/// `rusqlite::Connection` isn't Sync, so it sits behind a `Mutex`; every
/// operation is a short statement and needs exclusive access anyway.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Open or create the database at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| PlanboardError::Storage(e.to_string()))
    }
}

/// Create tables if absent, then apply additive migrations.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS counters (
            item_id TEXT NOT NULL,
            duration TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (item_id, duration)
        );

        CREATE TABLE IF NOT EXISTS annotations (
            detail_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            section TEXT NOT NULL,
            parent_title TEXT,
            text TEXT NOT NULL,
            author TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_annotations_created ON annotations(created_at);
        "#,
    )?;

    for (table, column, decl) in ADDITIVE_COLUMNS {
        add_column_if_missing(conn, table, column, decl)?;
    }

    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => {
            tracing::info!(table, column, "Added column");
            Ok(())
        }
        Err(err) if is_duplicate_column(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.contains("duplicate column name"),
        _ => false,
    }
}

fn annotation_from_row(row: &Row<'_>) -> rusqlite::Result<(Annotation, Option<String>)> {
    let allowed_raw: Option<String> = row.get("allowed_durations")?;
    let annotation = Annotation {
        detail_id: row.get("detail_id")?,
        item_id: row.get("item_id")?,
        section: row.get("section")?,
        parent_title: row.get("parent_title")?,
        phase_title: row.get("phase_title")?,
        allowed_durations: None,
        text: row.get("text")?,
        author: row.get("author")?,
        created_at: row.get("created_at")?,
    };
    Ok((annotation, allowed_raw))
}

impl CounterStore for SqliteStorage {
    fn counts_for_duration(&self, duration: DurationBucket) -> Result<BTreeMap<String, i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT item_id, count FROM counters WHERE duration = ?1")?;
        let rows = stmt.query_map(params![duration.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (id, count) = row?;
            counts.insert(id, count);
        }
        Ok(counts)
    }

    fn increment(&self, item_id: &str, duration: DurationBucket, delta: i64) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO counters (item_id, duration, count) VALUES (?1, ?2, MIN(MAX(0, ?3), ?4))
            ON CONFLICT(item_id, duration) DO UPDATE SET count = MIN(MAX(0, counters.count + ?3), ?4)
            "#,
            // Stored counts and the bounded delta both fit well inside i64
            params![item_id, duration.as_str(), delta.clamp(-MAX_COUNT, MAX_COUNT), MAX_COUNT],
        )?;
        Ok(())
    }

    fn set_count(&self, item_id: &str, duration: DurationBucket, value: i64) -> Result<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO counters (item_id, duration, count) VALUES (?1, ?2, ?3)
            ON CONFLICT(item_id, duration) DO UPDATE SET count = excluded.count
            "#,
            params![item_id, duration.as_str(), clamp_count(value)],
        )?;
        Ok(())
    }

    fn ensure_seed(&self, item_id: &str, duration: DurationBucket) -> Result<()> {
        // DO NOTHING keeps any existing value
        self.conn()?.execute(
            r#"
            INSERT INTO counters (item_id, duration, count) VALUES (?1, ?2, ?3)
            ON CONFLICT(item_id, duration) DO NOTHING
            "#,
            params![item_id, duration.as_str(), seed_value(item_id, duration)],
        )?;
        Ok(())
    }

    fn counter_rows(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM counters", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_many(&self, entries: &[(String, DurationBucket, i64)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO counters (item_id, duration, count) VALUES (?1, ?2, ?3)
                ON CONFLICT(item_id, duration) DO UPDATE SET count = excluded.count
                "#,
            )?;
            for (item_id, duration, count) in entries {
                stmt.execute(params![item_id, duration.as_str(), clamp_count(*count)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl AnnotationStore for SqliteStorage {
    fn upsert(&self, record: &NewAnnotation) -> Result<()> {
        let allowed = record
            .allowed_durations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // created_at is left out of the UPDATE so the first insert time sticks
        self.conn()?.execute(
            r#"
            INSERT INTO annotations
            (detail_id, item_id, section, parent_title, phase_title, allowed_durations, text, author, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(detail_id) DO UPDATE SET
                item_id = excluded.item_id,
                section = excluded.section,
                parent_title = excluded.parent_title,
                phase_title = excluded.phase_title,
                allowed_durations = excluded.allowed_durations,
                text = excluded.text,
                author = excluded.author
            "#,
            params![
                record.detail_id,
                record.item_id,
                record.section,
                record.parent_title,
                record.phase_title,
                allowed,
                record.text,
                record.author,
                now_ms(),
            ],
        )?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Annotation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT detail_id, item_id, section, parent_title, phase_title, allowed_durations, text, author, created_at
            FROM annotations
            ORDER BY created_at DESC, detail_id ASC
            "#,
        )?;

        let mut out = Vec::new();
        for row in stmt.query_map([], annotation_from_row)? {
            let (mut annotation, allowed_raw) = row?;
            annotation.allowed_durations = allowed_raw
                .as_deref()
                .map(serde_json::from_str::<Vec<String>>)
                .transpose()?;
            out.push(annotation);
        }
        Ok(out)
    }
}

impl Storage for SqliteStorage {
    fn backend(&self) -> BackendKind {
        BackendKind::Sqlite
    }
}
