//! Conversation turns and the persistent history store.
//!
//! History is an append-only ordered list of `{role, content}` records kept in
//! a single JSON file. A missing or corrupt file yields an empty history
//! rather than an error, so the agent can always start.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One finalized conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Persistent, append-only conversation history.
///
/// Only the turn loop writes to the store, one utterance at a time, so
/// implementations never see concurrent appends from two turns.
pub trait ConversationStore: Send + Sync {
    /// Append one finalized turn.
    fn append(&self, turn: Turn) -> CoreResult<()>;

    /// Load the full ordered history. Missing or corrupt storage returns an
    /// empty history, never an error.
    fn load_all(&self) -> Vec<Turn>;

    /// Delete all recorded turns.
    fn clear(&self) -> CoreResult<()>;
}

/// File-backed store: the whole history is one JSON array in a single file.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn read_file(&self) -> Vec<Turn> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<Vec<Turn>>(&data) {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("conversation log is corrupt, starting fresh: {}", e);
                Vec::new()
            }
        }
    }

    fn write_file(&self, turns: &[Turn]) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(turns)?;
        std::fs::write(&self.path, json).map_err(|e| CoreError::Store(e.to_string()))
    }
}

impl ConversationStore for JsonFileStore {
    fn append(&self, turn: Turn) -> CoreResult<()> {
        let _guard = self.lock.lock().expect("conversation store mutex poisoned");
        let mut turns = self.read_file();
        turns.push(turn);
        self.write_file(&turns)
    }

    fn load_all(&self) -> Vec<Turn> {
        let _guard = self.lock.lock().expect("conversation store mutex poisoned");
        self.read_file()
    }

    fn clear(&self) -> CoreResult<()> {
        let _guard = self.lock.lock().expect("conversation store mutex poisoned");
        self.write_file(&[])
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryStore {
    turns: Mutex<Vec<Turn>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryStore {
    fn append(&self, turn: Turn) -> CoreResult<()> {
        self.turns
            .lock()
            .expect("in-memory store mutex poisoned")
            .push(turn);
        Ok(())
    }

    fn load_all(&self) -> Vec<Turn> {
        self.turns
            .lock()
            .expect("in-memory store mutex poisoned")
            .clone()
    }

    fn clear(&self) -> CoreResult<()> {
        self.turns
            .lock()
            .expect("in-memory store mutex poisoned")
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("log.json"));

        store.append(Turn::user("I have a headache")).unwrap();
        store.append(Turn::assistant("Rest and stay hydrated.")).unwrap();

        let turns = store.load_all();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Rest and stay hydrated.");
    }

    #[test]
    fn missing_file_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("never_written.json"));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn corrupt_file_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{ not json [").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load_all().is_empty());

        // The store must still accept appends afterwards.
        store.append(Turn::user("hello")).unwrap();
        assert_eq!(store.load_all().len(), 1);
    }

    #[test]
    fn clear_empties_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("log.json"));
        store.append(Turn::user("hello")).unwrap();
        store.clear().unwrap();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
