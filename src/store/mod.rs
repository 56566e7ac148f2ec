//! Checkpoint persistence for runs.
//!
//! The driver saves the full run state after every step, keyed by session
//! id, so a paused, cancelled or crashed run resumes exactly where it
//! stopped. Two implementations:
//! - **MemoryCheckpointer**: process-local map, for tests and throwaway runs
//! - **SessionStore**: JSONL snapshot log (source of truth) plus SQLite index
//!
//! # Example
//!
//! ```ignore
//! use itdept::store::{Checkpointer, SessionStore};
//!
//! let store = SessionStore::open(Path::new("/var/lib/itdept"))?;
//! store.save(&state)?;
//! let resumed = store.load(&state.session_id)?;
//! ```

mod session_store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};

pub use session_store::SessionStore;

use crate::domain::{RunState, RunStatus};

/// Saves and restores run snapshots
pub trait Checkpointer: Send + Sync {
    fn save(&self, state: &RunState) -> Result<()>;

    fn load(&self, session_id: &str) -> Result<Option<RunState>>;

    /// Latest snapshot of every session, oldest session first
    fn list(&self) -> Result<Vec<SessionSummary>>;
}

/// One line of `itdept sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub task: String,
    pub repo_path: PathBuf,
    pub status: RunStatus,
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RunState> for SessionSummary {
    fn from(state: &RunState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            task: state.task.clone(),
            repo_path: state.repo_path.clone(),
            status: state.status,
            iteration: state.iteration,
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}

#[derive(Default)]
pub struct MemoryCheckpointer {
    states: Mutex<HashMap<String, RunState>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, state: &RunState) -> Result<()> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<RunState>> {
        Ok(self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sessions: Vec<SessionSummary> = states.values().map(SessionSummary::from).collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_checkpointer() {
        let store = MemoryCheckpointer::new();
        assert!(store.is_empty());

        let mut state = RunState::new("s1", "task", "/tmp/repo");
        store.save(&state).unwrap();
        state.iteration = 3;
        store.save(&state).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.load("s1").unwrap().unwrap().iteration, 3);
        assert!(store.load("s2").unwrap().is_none());

        let sessions = store.list().unwrap();
        assert_eq!(sessions[0].session_id, "s1");
        assert_eq!(sessions[0].status, RunStatus::Running);
    }
}
