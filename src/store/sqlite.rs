//! SQLite-backed storage: problem catalog, attempt history and the durable key-value table.
//!
//! One connection behind a mutex. Every call runs on tokio's blocking pool, so
//! disk I/O never stalls the async workers, and never awaits while holding the lock.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument};

use crate::domain::{Difficulty, HistoryEntry, Problem, ProblemId};
use crate::error::{PracticeError, StoreError};
use crate::store::kv::{parse_counter, KvStore};
use crate::store::{AttemptHistory, Catalog};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS problems (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    difficulty TEXT NOT NULL CHECK (difficulty IN ('Easy','Medium','Hard')),
    acceptance_rate REAL NOT NULL,
    frequency REAL NOT NULL,
    related_topics TEXT NOT NULL DEFAULT '[]',
    asked_by_faang INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS user_attempts (
    id INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    problem_id INTEGER NOT NULL,
    iterations INTEGER NOT NULL,
    user_difficulty TEXT NOT NULL,
    leetcode_difficulty TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    FOREIGN KEY(problem_id) REFERENCES problems(id)
);
CREATE INDEX IF NOT EXISTS idx_user_attempts_user ON user_attempts(user_id);
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const PROBLEM_COLUMNS: &str =
    "id, title, description, difficulty, acceptance_rate, frequency, related_topics, asked_by_faang";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let count: i64 = conn.query_row("SELECT count(*) FROM problems", [], |row| row.get(0))?;
        info!(target: "leetcoach_backend", problems = count, "Database schema ready");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` on the blocking pool against a handle sharing this connection.
    async fn blocking<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| E::from(StoreError::from(e)))?
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn sample_sync(&self, n: usize) -> Result<Vec<Problem>, PracticeError> {
        let conn = self.lock()?;
        let ids: Vec<ProblemId> = {
            let mut stmt = conn.prepare("SELECT id FROM problems").map_err(StoreError::from)?;
            let rows = stmt.query_map([], |row| row.get(0)).map_err(StoreError::from)?;
            rows.collect::<Result<_, _>>().map_err(StoreError::from)?
        };
        if ids.is_empty() {
            return Err(PracticeError::EmptyCatalog);
        }

        let chosen: Vec<ProblemId> = ids.choose_multiple(&mut rand::thread_rng(), n).copied().collect();
        debug!(target: "practice", requested = n, available = ids.len(), chosen = chosen.len(), "Sampled catalog");

        let sql = format!("SELECT {} FROM problems WHERE id = ?", PROBLEM_COLUMNS);
        let mut stmt = conn.prepare(&sql).map_err(StoreError::from)?;
        let mut out = Vec::with_capacity(chosen.len());
        for id in chosen {
            out.push(stmt.query_row([id], problem_from_row).map_err(StoreError::from)?);
        }
        Ok(out)
    }

    fn get_sync(&self, id: ProblemId) -> Result<Problem, PracticeError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM problems WHERE id = ?", PROBLEM_COLUMNS);
        conn.query_row(&sql, [id], problem_from_row)
            .optional()
            .map_err(StoreError::from)?
            .ok_or(PracticeError::ProblemNotFound(id))
    }

    fn import_sync(&self, problems: &[Problem]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO problems
                 (id, title, description, difficulty, acceptance_rate, frequency, related_topics, asked_by_faang)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for p in problems {
                let topics = serde_json::to_string(&p.related_topics)?;
                stmt.execute(params![
                    p.id,
                    p.title,
                    p.description,
                    p.difficulty.as_str(),
                    p.acceptance_rate,
                    p.frequency,
                    topics,
                    p.asked_by_faang
                ])?;
            }
        }
        tx.commit()?;
        Ok(problems.len())
    }

    fn count_sync(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM problems", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    fn append_sync(&self, e: &HistoryEntry) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_attempts
             (user_id, problem_id, iterations, user_difficulty, leetcode_difficulty, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                e.user_id,
                e.problem_id,
                e.iterations,
                e.user_difficulty.as_str(),
                e.leetcode_difficulty.as_str(),
                e.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn history_sync(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, problem_id, iterations, user_difficulty, leetcode_difficulty, timestamp
             FROM user_attempts WHERE user_id = ? ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(HistoryEntry {
                id: Some(row.get(0)?),
                user_id: row.get(1)?,
                problem_id: row.get(2)?,
                iterations: row.get(3)?,
                user_difficulty: difficulty_at(row, 4)?,
                leetcode_difficulty: difficulty_at(row, 5)?,
                timestamp: timestamp_at(row, 6)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn kv_get_sync(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| row.get(0))
            .optional()?)
    }

    fn kv_set_sync(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn kv_incr_sync(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current: Option<String> = tx
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        let next = match current {
            Some(raw) => parse_counter(key, &raw)? + 1,
            None => 1,
        };
        tx.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, next.to_string()],
        )?;
        tx.commit()?;
        Ok(next)
    }

    fn kv_delete_sync(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(())
    }

    fn kv_cas_sync(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = match expected {
            None => conn.execute(
                "INSERT OR IGNORE INTO kv_store (key, value) VALUES (?1, ?2)",
                params![key, new],
            )?,
            Some(old) => conn.execute(
                "UPDATE kv_store SET value = ?2 WHERE key = ?1 AND value = ?3",
                params![key, new, old],
            )?,
        };
        Ok(changed == 1)
    }
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::from(msg))
}

fn difficulty_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Difficulty> {
    let raw: String = row.get(idx)?;
    raw.parse::<Difficulty>().map_err(|e| conversion_error(idx, e))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn problem_from_row(row: &Row<'_>) -> rusqlite::Result<Problem> {
    let topics_raw: String = row.get(6)?;
    let related_topics: Vec<String> =
        serde_json::from_str(&topics_raw).map_err(|e| conversion_error(6, e.to_string()))?;
    Ok(Problem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        difficulty: difficulty_at(row, 3)?,
        acceptance_rate: row.get(4)?,
        frequency: row.get(5)?,
        related_topics,
        asked_by_faang: row.get(7)?,
    })
}

#[async_trait]
impl Catalog for Database {
    async fn sample_problems(&self, n: usize) -> Result<Vec<Problem>, PracticeError> {
        self.blocking(move |db| db.sample_sync(n)).await
    }

    async fn get_problem(&self, id: ProblemId) -> Result<Problem, PracticeError> {
        self.blocking(move |db| db.get_sync(id)).await
    }

    async fn import_problems(&self, problems: &[Problem]) -> Result<usize, StoreError> {
        let problems = problems.to_vec();
        self.blocking(move |db| db.import_sync(&problems)).await
    }

    async fn problem_count(&self) -> Result<usize, StoreError> {
        self.blocking(|db| db.count_sync()).await
    }
}

#[async_trait]
impl AttemptHistory for Database {
    async fn append(&self, entry: &HistoryEntry) -> Result<i64, StoreError> {
        let entry = entry.clone();
        self.blocking(move |db| db.append_sync(&entry)).await
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.history_sync(&user_id)).await
    }
}

#[async_trait]
impl KvStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.blocking(move |db| db.kv_get_sync(&key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.blocking(move |db| db.kv_set_sync(&key, &value)).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let key = key.to_string();
        self.blocking(move |db| db.kv_incr_sync(&key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.blocking(move |db| db.kv_delete_sync(&key)).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        let (key, expected, new) = (key.to_string(), expected.map(str::to_string), new.to_string());
        self.blocking(move |db| db.kv_cas_sync(&key, expected.as_deref(), &new)).await
    }
}
