use crate::history::Session;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const HISTORY_FILE: &str = "history.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write history: {0}")]
    Io(#[from] std::io::Error),

    #[error("History slot is poisoned")]
    Poisoned,
}

/// Durable slot holding the serialized history.
///
/// `load` never fails: missing or unreadable data is an empty history.
pub trait HistoryStore: Send {
    fn load(&self) -> Vec<Session>;

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError>;
}

/// `history.json` in the data directory.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Vec<Session> {
        if !self.path.exists() {
            return Vec::new();
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to read history {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        match parse_sessions(&raw) {
            Some(sessions) => sessions,
            None => {
                let backup = self.path.with_extension("json.bak");
                if let Err(e) = fs::copy(&self.path, &backup) {
                    tracing::warn!("Failed to back up unreadable history: {}", e);
                } else {
                    tracing::warn!("History was unreadable, kept a copy at {:?}", backup);
                }
                Vec::new()
            }
        }
    }

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(sessions)?;

        // Write aside and rename so a crash never leaves a half-written slot.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Process-local slot, for embedding without a filesystem and for tests.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw slot content, as if written by an earlier run.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Vec<Session> {
        self.raw()
            .and_then(|raw| parse_sessions(&raw))
            .unwrap_or_default()
    }

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let json = serde_json::to_string(sessions)?;
        let mut slot = self.slot.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(json);
        Ok(())
    }
}

impl<T: HistoryStore + Sync> HistoryStore for std::sync::Arc<T> {
    fn load(&self) -> Vec<Session> {
        (**self).load()
    }

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        (**self).save(sessions)
    }
}

fn parse_sessions(raw: &str) -> Option<Vec<Session>> {
    if raw.trim().is_empty() {
        return Some(Vec::new());
    }
    match serde_json::from_str::<Vec<Session>>(raw) {
        Ok(sessions) => Some(sessions),
        Err(e) => {
            tracing::error!("Failed to parse history: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_order() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::in_dir(&dir.path().join("nested"));
        let sessions = vec![
            Session::new("second", None, None),
            Session::new("first", Some("AAAA".to_string()), None),
        ];

        store.save(&sessions).unwrap();
        assert_eq!(store.load(), sessions);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupted_file_loads_empty_and_is_backed_up() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        fs::write(store.path(), "[{\"id\": 1, oops").unwrap();

        assert!(store.load().is_empty());
        let backup = store.path().with_extension("json.bak");
        assert_eq!(fs::read_to_string(backup).unwrap(), "[{\"id\": 1, oops");
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let store = MemoryStore::with_raw(r#"{"not": "a list"}"#);
        assert!(store.load().is_empty());

        let store = MemoryStore::with_raw("");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.raw().is_none());

        let sessions = vec![Session::new("topic", None, None)];
        store.save(&sessions).unwrap();
        assert_eq!(store.load(), sessions);
    }
}
