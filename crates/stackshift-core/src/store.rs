//! Migration state persistence
//!
//! [`FileStateStore`] keeps one JSON document per migration id and replaces
//! it atomically (write to a temporary file, then rename).
//! [`MemoryStateStore`] is the in-process equivalent.

use crate::error::StoreError;
use crate::state::MigrationState;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

const STATE_SUFFIX: &str = ".state.json";

/// Storage for [`MigrationState`] keyed by migration id
#[async_trait::async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Persist the whole state, replacing any previous version
    async fn save(&self, state: &MigrationState) -> Result<(), StoreError>;

    /// Load a state; `Ok(None)` when the id is unknown
    async fn load(&self, id: &str) -> Result<Option<MigrationState>, StoreError>;

    /// Known migration ids, sorted
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// JSON files under a directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create store rooted at `dir`; the directory is created on first save
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a migration's state file
    #[must_use]
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}{STATE_SUFFIX}"))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait::async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, state: &MigrationState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        let path = self.path_for(&state.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(state)?;

        tokio::fs::write(&tmp, body).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error(&path))?;

        tracing::debug!(
            migration_id = %state.id,
            step = %state.current_step,
            status = %state.status,
            "persisted migration state"
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<MigrationState>, StoreError> {
        let path = self.path_for(id);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(STATE_SUFFIX))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: DashMap<String, MigrationState>,
}

impl MemoryStateStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored migrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, state: &MigrationState) -> Result<(), StoreError> {
        self.states.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<MigrationState>, StoreError> {
        Ok(self.states.get(id).map(|s| s.value().clone()))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.states.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::step::MigrationStep;

    #[tokio::test]
    async fn file_store_round_trips_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));

        assert!(store.load("missing").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());

        let mut state = MigrationState::new(MigrationConfig::new("t.json")).with_id("m-1");
        store.save(&state).await.unwrap();
        state.current_step = MigrationStep::Discovery;
        store.save(&state).await.unwrap();

        let loaded = store.load("m-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, MigrationStep::Discovery);
        assert_eq!(store.list().await.unwrap(), vec!["m-1".to_string()]);
        // No temporary file left behind
        assert!(!store.path_for("m-1").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        std::fs::write(store.path_for("bad"), b"{not json").unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn memory_store_replaces_whole_state() {
        let store = MemoryStateStore::new();
        let mut state = MigrationState::new(MigrationConfig::default()).with_id("a");
        store.save(&state).await.unwrap();
        state.error = Some("x".into());
        store.save(&state).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.load("a").await.unwrap().unwrap().error.as_deref(), Some("x"));
    }
}
