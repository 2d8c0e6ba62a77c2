//! SQLite persistence for remembered commands.
//!
//! One row per distinct command, plus an FTS5 index over the keyword tags of
//! the question that last produced it. Triggers keep the index in step with the
//! table, so every write is reflected in search results as soon as it returns.

use crate::error::{interrupted, OpenStage};
use crate::{keywords, MemoryError, OpContext, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use how_types::Interaction;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// File name of the database inside the memory directory.
pub const DB_FILE_NAME: &str = "memory.db";

/// Default time to wait for a lock held by another connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite VM steps between checks of the operation's [`OpContext`].
const PROGRESS_STEPS: i32 = 1000;

const COLUMNS: &str = "id, question, command, explanation, tags, created_at, use_count";

/// Options for [`InteractionStore::open_with`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on waiting for a database lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// SQLite-based store of question → command interactions.
pub struct InteractionStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl InteractionStore {
    /// Open or create the store in `dir` with default options.
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_with(dir, &StoreOptions::default())
    }

    /// Open or create the store in `dir`.
    ///
    /// Creates the directory and schema if needed and rebuilds the full-text
    /// index before returning. On failure the connection is released and no
    /// store is returned.
    pub fn open_with(dir: &Path, options: &StoreOptions) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|source| MemoryError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&path).map_err(open_error(OpenStage::Connect))?;

        Self::configure(&conn, options)?;
        Self::init_schema(&conn)?;
        Self::rebuild_fts_index(&conn)?;
        Self::migrate(&conn)?;

        tracing::debug!(target: "how::memory", "Opened memory store at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store, reporting any failure to release the connection.
    ///
    /// Dropping the store also closes it; this variant surfaces the error.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.close().map_err(|(_, e)| MemoryError::Close(e))
    }

    fn configure(conn: &Connection, options: &StoreOptions) -> Result<()> {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(open_error(OpenStage::JournalMode))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(target: "how::memory", "WAL unavailable, journal mode is {}", mode);
        }

        conn.busy_timeout(options.busy_timeout)
            .map_err(open_error(OpenStage::BusyTimeout))?;
        Ok(())
    }

    /// Create the interactions table, its FTS5 index and the sync triggers.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interactions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                question    TEXT    NOT NULL,
                command     TEXT    NOT NULL,
                explanation TEXT    NOT NULL DEFAULT '',
                tags        TEXT    NOT NULL DEFAULT '',
                created_at  TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                use_count   INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_created_at
                ON interactions(created_at);

            CREATE VIRTUAL TABLE IF NOT EXISTS interactions_fts USING fts5(
                tags,
                content='interactions',
                content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS interactions_ai
            AFTER INSERT ON interactions BEGIN
                INSERT INTO interactions_fts(rowid, tags) VALUES (NEW.id, NEW.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS interactions_ad
            AFTER DELETE ON interactions BEGIN
                INSERT INTO interactions_fts(interactions_fts, rowid, tags)
                VALUES ('delete', OLD.id, OLD.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS interactions_au
            AFTER UPDATE ON interactions BEGIN
                INSERT INTO interactions_fts(interactions_fts, rowid, tags)
                VALUES ('delete', OLD.id, OLD.tags);
                INSERT INTO interactions_fts(rowid, tags) VALUES (NEW.id, NEW.tags);
            END;
            "#,
        )
        .map_err(open_error(OpenStage::Schema))?;
        Ok(())
    }

    /// Add the unique index on `command` to databases that predate it.
    ///
    /// Such databases may hold several rows for one command; the oldest row of
    /// each command is kept so its `created_at` survives.
    fn migrate(conn: &Connection) -> Result<()> {
        let has_unique_command: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name='idx_interactions_command'",
                [],
                |row| row.get(0),
            )
            .map_err(open_error(OpenStage::LegacyRepair))?;

        if has_unique_command {
            return Ok(());
        }

        let repair = || -> rusqlite::Result<usize> {
            let tx = conn.unchecked_transaction()?;
            let removed = tx.execute(
                r#"
                DELETE FROM interactions
                WHERE id NOT IN (SELECT MIN(id) FROM interactions GROUP BY command)
                "#,
                [],
            )?;
            tx.execute(
                "CREATE UNIQUE INDEX idx_interactions_command ON interactions(command)",
                [],
            )?;
            tx.commit()?;
            Ok(removed)
        };

        let removed = repair().map_err(open_error(OpenStage::LegacyRepair))?;
        if removed > 0 {
            tracing::info!(
                target: "how::memory",
                "Removed {} duplicate commands while adding the unique command index",
                removed
            );
        }
        Ok(())
    }

    /// Rebuild the FTS index from the interactions table.
    ///
    /// Runs on every open, before any row is deleted through the triggers, so
    /// an index left stale by an older schema is repaired before first use.
    fn rebuild_fts_index(conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO interactions_fts(interactions_fts) VALUES('rebuild')",
            [],
        )
        .map_err(open_error(OpenStage::RebuildIndex))?;

        // The FTS index replaces the old LIKE index on tags.
        if let Err(e) = conn.execute("DROP INDEX IF EXISTS idx_interactions_tags", []) {
            tracing::debug!(target: "how::memory", "Could not drop legacy tags index: {}", e);
        }
        Ok(())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Record that `question` led to `command`.
    ///
    /// The first save of a command inserts a row with `use_count = 1`. Later
    /// saves of the same command increment `use_count` and overwrite the
    /// question, tags and explanation; `id` and `created_at` are kept.
    pub fn save(
        &self,
        ctx: &OpContext,
        question: &str,
        command: &str,
        explanation: &str,
    ) -> Result<()> {
        let tags = keywords::tags_for(question);
        let now = timestamp(Utc::now());

        self.run(ctx, |conn| {
            conn.execute(
                r#"
                INSERT INTO interactions (question, command, explanation, tags, created_at, use_count)
                VALUES (?1, ?2, ?3, ?4, ?5, 1)
                ON CONFLICT(command) DO UPDATE SET
                    question = excluded.question,
                    explanation = excluded.explanation,
                    tags = excluded.tags,
                    use_count = interactions.use_count + 1
                "#,
                params![question, command, explanation, tags, now],
            )
        })
        .map_err(MemoryError::Save)?;

        tracing::debug!(target: "how::memory", "Saved command {:?} with tags [{}]", command, tags);
        Ok(())
    }

    /// Recall interactions whose tags share a keyword with `question`.
    ///
    /// Best matches first: ascending bm25 score, then higher `use_count`, then
    /// newer `created_at`. A question with no keywords returns nothing without
    /// querying the database.
    pub fn search(&self, ctx: &OpContext, question: &str, limit: usize) -> Result<Vec<Interaction>> {
        let keywords = keywords::extract(question);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = fts_match_expression(&keywords);

        let interactions = self
            .run(ctx, |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {}
                    FROM interactions_fts
                    JOIN interactions i ON i.id = interactions_fts.rowid
                    WHERE interactions_fts MATCH ?1
                    ORDER BY bm25(interactions_fts) ASC, i.use_count DESC, i.created_at DESC
                    LIMIT ?2
                    "#,
                    qualified_columns("i")
                ))?;
                let rows = stmt
                    .query_map(params![match_expr, sql_limit(limit)], row_to_interaction)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(MemoryError::Search)?;

        tracing::debug!(
            target: "how::memory",
            "Search {:?} matched {} interactions",
            match_expr,
            interactions.len()
        );
        Ok(interactions)
    }

    /// The most recently created interactions, newest first.
    pub fn list(&self, ctx: &OpContext, limit: usize) -> Result<Vec<Interaction>> {
        self.run(ctx, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM interactions ORDER BY created_at DESC, id DESC LIMIT ?1",
                COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![sql_limit(limit)], row_to_interaction)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .map_err(MemoryError::List)
    }

    /// Number of stored interactions.
    pub fn count(&self, ctx: &OpContext) -> Result<u64> {
        let count: i64 = self
            .run(ctx, |conn| {
                conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
            })
            .map_err(MemoryError::List)?;
        Ok(count as u64)
    }

    /// Delete every interaction. The delete trigger empties the FTS index.
    ///
    /// Returns the number of interactions removed.
    pub fn clear(&self, ctx: &OpContext) -> Result<usize> {
        let removed = self
            .run(ctx, |conn| conn.execute("DELETE FROM interactions", []))
            .map_err(MemoryError::Clear)?;

        tracing::info!(target: "how::memory", "Cleared {} interactions", removed);
        Ok(removed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` with a progress handler that aborts it once `ctx` is done.
    fn run<T>(
        &self,
        ctx: &OpContext,
        op: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        if ctx.is_done() {
            return Err(interrupted());
        }

        let conn = self.lock();
        let watch = ctx.clone();
        conn.progress_handler(PROGRESS_STEPS, Some(move || watch.is_done()));
        let result = op(&conn);
        conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);
        result
    }
}

fn open_error(stage: OpenStage) -> impl FnOnce(rusqlite::Error) -> MemoryError {
    move |source| MemoryError::Open { stage, source }
}

/// OR of the keywords, each quoted so it only matches a whole token.
fn fts_match_expression(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| format!("\"{}\"", k.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn qualified_columns(alias: &str) -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Fixed-width RFC 3339 UTC, so text order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_interaction(row: &rusqlite::Row) -> rusqlite::Result<Interaction> {
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let use_count: i64 = row.get(6)?;
    let use_count = u32::try_from(use_count).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    Ok(Interaction {
        id: row.get(0)?,
        question: row.get(1)?,
        command: row.get(2)?,
        explanation: row.get(3)?,
        tags: row.get(4)?,
        created_at,
        use_count,
    })
}
