//! Persisted session progress

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chainrun_tasks::Fingerprint;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CoreResult;

/// Contents of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Run order of the whole session
    pub order: Vec<Fingerprint>,

    /// Account that was running last
    pub account_hash: Option<Fingerprint>,
}

impl SessionState {
    pub fn new(order: Vec<Fingerprint>) -> Self {
        let account_hash = order.first().cloned();
        Self {
            order,
            account_hash,
        }
    }

    /// Same accounts as `fingerprints`, in any order
    pub fn matches(&self, fingerprints: &[Fingerprint]) -> bool {
        let mut saved = self.order.clone();
        let mut current = fingerprints.to_vec();
        saved.sort();
        current.sort();
        saved == current
    }
}

/// State file with whole-file atomic rewrites
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved state; `None` when there is none or it cannot be read
    pub fn load(&self) -> CoreResult<Option<SessionState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Ignoring unreadable state file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, state: &SessionState) -> CoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, current = ?state.account_hash, "Session state saved");
        Ok(())
    }

    /// Forget saved progress; returns whether there was any
    pub fn clear(&self) -> CoreResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fingerprints(identities: &[&str]) -> Vec<Fingerprint> {
        identities.iter().map(|id| Fingerprint::of(id)).collect()
    }

    #[test]
    fn test_matches_ignores_order_but_not_multiplicity() {
        let state = SessionState::new(fingerprints(&["a", "b", "b"]));
        assert!(state.matches(&fingerprints(&["b", "a", "b"])));
        assert!(!state.matches(&fingerprints(&["a", "b"])));
        assert!(!state.matches(&fingerprints(&["a", "a", "b"])));
    }

    #[test]
    fn test_save_load_clear() -> CoreResult<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().join("state").join("last_state.json"));
        assert_eq!(store.load()?, None);

        let mut state = SessionState::new(fingerprints(&["a", "b"]));
        state.account_hash = Some(Fingerprint::of("b"));
        store.save(&state)?;
        assert_eq!(store.load()?, Some(state));
        assert!(!dir.path().join("state").join("last_state.json.tmp").exists());

        assert!(store.clear()?);
        assert!(!store.clear()?);
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[test]
    fn test_file_layout() -> CoreResult<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().join("last_state.json"));
        store.save(&SessionState::new(fingerprints(&["a"])))?;

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        let a = Fingerprint::of("a").to_string();
        assert_eq!(raw, serde_json::json!({"order": [a.clone()], "account_hash": a}));
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_ignored() -> CoreResult<()> {
        let dir = tempdir()?;
        let store = SessionStore::new(dir.path().join("last_state.json"));
        fs::write(store.path(), "{not json")?;
        assert_eq!(store.load()?, None);
        Ok(())
    }
}
