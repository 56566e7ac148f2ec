//! SessionStore: JSONL snapshot log with a SQLite index.
//!
//! - **JSONL file**: every snapshot ever saved, one per line (source of truth)
//! - **SQLite database**: latest snapshot per session, for lookups and listing
//!
//! The index records how many log lines it has seen; on open it is rebuilt
//! from the log whenever that count disagrees with the file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Checkpointer, SessionSummary};
use crate::domain::RunState;

const LOG_FILE: &str = "sessions.jsonl";
const DB_FILE: &str = "sessions.db";
const LINES_KEY: &str = "log_lines";

pub struct SessionStore {
    base_dir: PathBuf,
    jsonl_path: PathBuf,
    db: Mutex<Connection>,
}

impl SessionStore {
    /// Open or create a store under `base_dir`
    pub fn open(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir)
            .with_context(|| format!("Failed to create store directory: {}", base_dir.display()))?;

        let jsonl_path = base_dir.join(LOG_FILE);
        let db_path = base_dir.join(DB_FILE);
        let db = Connection::open(&db_path)
            .with_context(|| format!("Failed to open SQLite database: {}", db_path.display()))?;
        Self::init_schema(&db)?;

        let store = Self {
            base_dir: base_dir.to_path_buf(),
            jsonl_path,
            db: Mutex::new(db),
        };
        store.rebuild_index_if_needed()?;
        Ok(store)
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                task TEXT NOT NULL,
                repo_path TEXT NOT NULL,
                status TEXT NOT NULL,
                iteration INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                json_data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
            CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to initialize database schema")?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count_log_lines(&self) -> Result<usize> {
        if !self.jsonl_path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(&self.jsonl_path)?);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn indexed_lines(db: &Connection) -> Result<usize> {
        let value: Option<String> = db
            .query_row("SELECT value FROM meta WHERE key = ?1", [LINES_KEY], |row| row.get(0))
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    fn set_indexed_lines(db: &Connection, lines: usize) -> Result<()> {
        db.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![LINES_KEY, lines.to_string()],
        )?;
        Ok(())
    }

    fn rebuild_index_if_needed(&self) -> Result<()> {
        let lines = self.count_log_lines()?;
        let indexed = Self::indexed_lines(&self.conn())?;
        if lines != indexed {
            log::info!("rebuilding session index ({} log lines, {} indexed)", lines, indexed);
            self.rebuild_index()?;
        }
        Ok(())
    }

    /// Rebuild the SQLite index from the JSONL log; the last snapshot per session wins
    pub fn rebuild_index(&self) -> Result<()> {
        let mut latest: HashMap<String, RunState> = HashMap::new();
        let mut lines = 0;

        if self.jsonl_path.exists() {
            let reader = BufReader::new(File::open(&self.jsonl_path)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                lines += 1;
                match serde_json::from_str::<RunState>(&line) {
                    Ok(state) => {
                        latest.insert(state.session_id.clone(), state);
                    }
                    Err(e) => log::warn!("skipping unreadable snapshot on line {}: {}", number + 1, e),
                }
            }
        }

        let mut db = self.conn();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        for state in latest.values() {
            Self::index_snapshot(&tx, state)?;
        }
        Self::set_indexed_lines(&tx, lines)?;
        tx.commit()?;
        Ok(())
    }

    fn index_snapshot(db: &Connection, state: &RunState) -> Result<()> {
        let json_data = serde_json::to_string(state)?;
        db.execute(
            r#"
            INSERT OR REPLACE INTO sessions
            (session_id, task, repo_path, status, iteration, created_at, updated_at, json_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                state.session_id,
                state.task,
                state.repo_path.to_string_lossy().to_string(),
                state.status.as_str(),
                state.iteration,
                state.created_at.timestamp_millis(),
                state.updated_at.timestamp_millis(),
                json_data,
            ],
        )?;
        Ok(())
    }

    /// Every snapshot saved for one session, oldest first
    pub fn snapshots(&self, session_id: &str) -> Result<Vec<RunState>> {
        if !self.jsonl_path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.jsonl_path)?);
        let mut snapshots = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(state) = serde_json::from_str::<RunState>(&line)
                && state.session_id == session_id
            {
                snapshots.push(state);
            }
        }
        Ok(snapshots)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Checkpointer for SessionStore {
    fn save(&self, state: &RunState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.jsonl_path)
            .with_context(|| format!("Failed to open {}", self.jsonl_path.display()))?;
        writeln!(file, "{}", json)?;

        let db = self.conn();
        Self::index_snapshot(&db, state)?;
        let lines = Self::indexed_lines(&db)?;
        Self::set_indexed_lines(&db, lines + 1)?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<RunState>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT json_data FROM sessions WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json).context("Failed to parse stored snapshot")?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        let db = self.conn();
        let mut stmt = db.prepare("SELECT json_data FROM sessions ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for row in rows {
            let state: RunState = serde_json::from_str(&row?)?;
            sessions.push(SessionSummary::from(&state));
        }
        Ok(sessions)
    }
}
