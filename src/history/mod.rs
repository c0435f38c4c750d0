mod session;
pub mod store;

pub use session::Session;
pub use store::{HistoryStore, JsonFileStore, MemoryStore, StoreError};

use std::collections::HashSet;

/// Completed sessions, newest first, mirrored to a [`HistoryStore`] after
/// every change.
pub struct History {
    sessions: Vec<Session>,
    store: Box<dyn HistoryStore>,
}

impl History {
    pub fn load(store: Box<dyn HistoryStore>) -> Self {
        let mut seen = HashSet::new();
        let mut sessions = store.load();
        let loaded = sessions.len();
        sessions.retain(|s| seen.insert(s.id.clone()));
        if sessions.len() != loaded {
            tracing::warn!(
                "Dropped {} stored session(s) with duplicate ids",
                loaded - sessions.len()
            );
        }

        tracing::info!("History loaded: {} session(s)", sessions.len());
        Self { sessions, store }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Put `session` at the front. A session whose id is already present is
    /// refused and nothing is written.
    pub fn append(&mut self, session: Session) -> bool {
        if self.get(&session.id).is_some() {
            tracing::warn!("Session {} already in history, not added", session.id);
            return false;
        }

        tracing::info!("Session {} added to history", session.id);
        self.sessions.insert(0, session);
        self.persist();
        true
    }

    /// Remove by id. Unknown ids change nothing, in memory or on disk.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        let removed = self.sessions.remove(index);
        tracing::info!("Session {} removed from history", id);
        self.persist();
        Some(removed)
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.sessions) {
            tracing::error!("Failed to persist history: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FailingStore;

    impl HistoryStore for FailingStore {
        fn load(&self) -> Vec<Session> {
            Vec::new()
        }

        fn save(&self, _sessions: &[Session]) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn session_with_id(id: &str, topic: &str) -> Session {
        Session {
            id: id.to_string(),
            ..Session::new(topic, None, None)
        }
    }

    #[test]
    fn test_ids_stay_unique_under_random_operations() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = History::load(Box::new(MemoryStore::new()));

        for step in 0..1_000 {
            let id = format!("s{}", rng.gen_range(0..40));
            if rng.gen_bool(0.6) {
                history.append(session_with_id(&id, &format!("step {}", step)));
            } else {
                history.remove(&id);
            }

            let ids: HashSet<&str> = history.sessions().iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids.len(), history.len());
        }
    }

    #[test]
    fn test_append_prepends_and_survives_reload() {
        let dir = tempdir().unwrap();
        let mut history = History::load(Box::new(JsonFileStore::in_dir(dir.path())));

        let first = Session::new("first", None, None);
        let second = Session::new("second", None, None);
        assert!(history.append(first.clone()));
        assert!(history.append(second.clone()));
        assert_eq!(history.sessions()[0], second);

        let reloaded = History::load(Box::new(JsonFileStore::in_dir(dir.path())));
        assert_eq!(reloaded.sessions(), &[second, first]);
    }

    #[test]
    fn test_prepend_ignores_timestamps() {
        let mut history = History::load(Box::new(MemoryStore::new()));
        let mut newer = Session::new("newer clock", None, None);
        newer.timestamp += 60_000;
        let older = Session::new("appended last", None, None);

        history.append(newer);
        history.append(older.clone());
        assert_eq!(history.sessions()[0], older);
    }

    #[test]
    fn test_duplicate_append_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let mut history = History::load(Box::new(store.clone()));
        let session = session_with_id("same", "a");

        assert!(history.append(session.clone()));
        let persisted = store.raw();
        assert!(!history.append(session_with_id("same", "b")));
        assert_eq!(history.len(), 1);
        assert_eq!(store.raw(), persisted);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        let path = store.path().to_path_buf();
        let mut history = History::load(Box::new(store));
        history.append(Session::new("kept", None, None));
        let before = history.sessions().to_vec();
        let on_disk = std::fs::read(&path).unwrap();

        assert!(history.remove("missing").is_none());
        assert_eq!(history.sessions(), before.as_slice());
        assert_eq!(std::fs::read(&path).unwrap(), on_disk);
    }

    #[test]
    fn test_remove_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut history = History::load(Box::new(store.clone()));
        let session = Session::new("gone", None, None);
        history.append(session.clone());

        assert_eq!(history.remove(&session.id), Some(session));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupted_store_loads_empty() {
        let history = History::load(Box::new(MemoryStore::with_raw("not json at all")));
        assert!(history.is_empty());
    }

    #[test]
    fn test_duplicate_ids_on_load_keep_first() {
        let stored = vec![session_with_id("x", "newest"), session_with_id("x", "older")];
        let raw = serde_json::to_string(&stored).unwrap();
        let history = History::load(Box::new(MemoryStore::with_raw(raw)));

        assert_eq!(history.len(), 1);
        assert_eq!(history.sessions()[0].topic, "newest");
    }

    #[test]
    fn test_save_failure_does_not_block_mutation() {
        let mut history = History::load(Box::new(FailingStore));
        assert!(history.append(Session::new("still here", None, None)));
        assert_eq!(history.len(), 1);
    }
}
