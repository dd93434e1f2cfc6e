//! Per-session rolling chat history.

use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use scribe_core::Turn;

/// Turns kept per session; older turns are dropped first.
pub const MAX_TURNS: usize = 5;

/// In-memory map from session id to its most recent turns.
///
/// Sessions are never evicted, so the map grows with the number of distinct
/// session ids for the life of the process. Locks are only held for map
/// access, never across an await.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, VecDeque<Turn>>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TURNS)
    }

    pub fn with_capacity(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    /// Turns for `session_id`, oldest first. Unknown ids have no history.
    pub fn get_history(&self, session_id: &str) -> Vec<Turn> {
        self.read()
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, then trim the session to the newest `max_turns`.
    pub fn append_turn(
        &self,
        session_id: &str,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) {
        let mut sessions = self.write();
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push_back(Turn::new(question, answer));
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Number of sessions seen so far
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic elsewhere while holding the lock cannot leave a half-written
    // deque behind, so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, VecDeque<Turn>>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, VecDeque<Turn>>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
