//! On-disk persistence for account sessions.
//!
//! All accounts share a single JSON file keyed by account id. Writes follow
//! a read-merge-write discipline under a lock so a save for one account
//! never drops another account's entry, and go through a temp file + rename
//! so a torn file is never observed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{KeeperError, Result};
use crate::session::Session;

/// Cheaply clonable handle over the shared session file.
///
/// Clones share one lock, so every passport client handed a clone of the
/// same store serializes its writes against the others.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Load the persisted session for `account`.
    ///
    /// A missing or unreadable file, or a malformed entry, reads as an empty
    /// session; the caller then performs a fresh login.
    pub fn load(&self, account: &str) -> Session {
        let _guard = self.inner.lock.lock();
        self.read_all()
            .remove(account)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Persist the session for `account`, leaving every other entry intact.
    pub fn save(&self, account: &str, session: &Session) -> Result<()> {
        let _guard = self.inner.lock.lock();

        let mut entries = self.read_all();
        entries.insert(account.to_string(), serde_json::to_value(session)?);

        let bytes = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.inner.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| self.persistence_error(e))?;
        std::fs::rename(&tmp, &self.inner.path)
            .map_err(|e| self.persistence_error(e))
    }

    /// Foreign entries are carried as raw JSON so unknown keys written by
    /// other versions survive a save verbatim.
    fn read_all(&self) -> BTreeMap<String, serde_json::Value> {
        let bytes = match std::fs::read(&self.inner.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.inner.path.display(), error = %e, "session file unreadable; treating as empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.inner.path.display(), error = %e, "session file malformed; treating as empty");
                BTreeMap::new()
            }
        }
    }

    fn persistence_error(&self, source: std::io::Error) -> KeeperError {
        KeeperError::Persistence {
            path: self.inner.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::session::CookieRecord;

    use super::*;

    fn session_with(name: &str, value: &str) -> Session {
        let mut session = Session::default();
        session.insert(name, CookieRecord::new(value));
        session
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        let session = session_with("SESSDATA", "abc");
        store.save("alice", &session).unwrap();

        assert_eq!(store.load("alice"), session);
    }

    #[test]
    fn test_saving_one_account_keeps_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        let alice = session_with("SESSDATA", "a");
        let bob = session_with("SESSDATA", "b");
        store.save("alice", &alice).unwrap();
        store.save("bob", &bob).unwrap();

        assert_eq!(store.load("alice"), alice);
        assert_eq!(store.load("bob"), bob);
    }

    #[test]
    fn test_unknown_account_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"));

        assert!(store.load("nobody").is_empty());
    }

    #[test]
    fn test_malformed_file_reads_as_empty_and_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = SessionStore::new(&path);
        assert!(store.load("alice").is_empty());

        // A save after the bad read produces a valid file again.
        store.save("alice", &session_with("sid", "1")).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        serde_json::from_slice::<serde_json::Value>(&bytes).unwrap();
    }

    #[test]
    fn test_foreign_json_entries_survive_saves_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            br#"{"legacy": {"sid": {"value": "x", "extra_field": 42}}}"#,
        )
        .unwrap();

        let store = SessionStore::new(&path);
        store.save("alice", &session_with("sid", "1")).unwrap();

        let all: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(all["legacy"]["sid"]["extra_field"], 42);
        assert_eq!(all["alice"]["sid"]["value"], "1");
    }

    #[test]
    fn test_concurrent_saves_do_not_drop_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let store = SessionStore::new(&path);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let account = format!("account-{}", i);
                    store
                        .save(&account, &session_with("sid", &i.to_string()))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Valid JSON with every account present.
        let all: BTreeMap<String, serde_json::Value> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(all.len(), 8);
        for i in 0..8 {
            assert!(all.contains_key(&format!("account-{}", i)));
        }
    }
}
