//! # Result Handoff Store
//!
//! Persists the most recent result collection so a separate process (the `results`,
//! `download` and `download-all` commands) can read it without re-running compression.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ──► Loading ──load()──► Loaded(results) ──write()/clear()──► Loaded(..)
//! ```
//!
//! `Loading` and "loaded but empty" are distinct states so a consumer can tell "not checked yet"
//! from "confirmed no results".
//!
//! ## Failure Policy
//!
//! Storage failures never propagate. The in-memory collection is updated first and stays
//! authoritative for the rest of the process; the failure is logged and reported back as
//! [`PersistReport::NotPersisted`].

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{ReduceError, ReduceResult};
use crate::model::CompressedResult;

/// Slot holding the serialized result collection.
pub const RESULTS_SLOT: &str = "processedImages";

/// Named string slots, the native key-value storage of the host.
pub trait StorageBackend: Send {
    /// Read a slot, `None` when it does not exist.
    fn get(&self, slot: &str) -> ReduceResult<Option<String>>;
    /// Replace a slot's content.
    fn set(&mut self, slot: &str, value: &str) -> ReduceResult<()>;
    /// Delete a slot. Deleting a missing slot succeeds.
    fn remove(&mut self, slot: &str) -> ReduceResult<()>;
}

/// One `<slot>.json` file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, slot: &str) -> ReduceResult<Option<String>> {
        let path = self.slot_path(slot);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReduceError::io_at("read slot", &path, e)),
        }
    }

    fn set(&mut self, slot: &str, value: &str) -> ReduceResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| ReduceError::io_at("create data dir", &self.dir, e))?;
        let path = self.slot_path(slot);
        // Write to a sibling temp file and rename so readers never see a partial slot.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| ReduceError::io_at("create temp slot", &self.dir, e))?;
        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ReduceError::io_at("write slot", tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| ReduceError::io_at("persist slot", &path, e.error))?;
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> ReduceResult<()> {
        let path = self.slot_path(slot);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReduceError::io_at("remove slot", &path, e)),
        }
    }
}

/// In-memory slots. Clones share the same slots, which lets two store instances observe each
/// other's writes the way two processes share a data directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
    read_only: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose writes and removals always fail, like a full or disabled store.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, slot: &str) -> ReduceResult<Option<String>> {
        Ok(self.slots().get(slot).cloned())
    }

    fn set(&mut self, slot: &str, value: &str) -> ReduceResult<()> {
        if self.read_only {
            return Err(ReduceError::storage(slot, "write", "storage is read-only"));
        }
        self.slots().insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> ReduceResult<()> {
        if self.read_only {
            return Err(ReduceError::storage(slot, "remove", "storage is read-only"));
        }
        self.slots().remove(slot);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

/// What a consumer observes when reading the store.
#[derive(Debug, PartialEq)]
pub enum StoreView<'a> {
    /// Storage has not been checked yet.
    Loading,
    /// Storage was checked; the slice may be empty.
    Loaded(&'a [CompressedResult]),
}

/// Outcome of a best-effort persistence step.
#[derive(Debug)]
pub enum PersistReport {
    Persisted,
    NotPersisted(ReduceError),
}

impl PersistReport {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistReport::Persisted)
    }
}

/// Holds the latest result collection and mirrors it into a storage slot.
pub struct HandoffStore {
    backend: Box<dyn StorageBackend>,
    slot: String,
    state: LoadState,
    results: Vec<CompressedResult>,
}

impl HandoffStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            slot: RESULTS_SLOT.to_string(),
            state: LoadState::Loading,
            results: Vec::new(),
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// The one start-up read. Missing, unreadable or corrupt slots all load as empty.
    pub fn load(&mut self) -> &[CompressedResult] {
        self.results = match self.backend.get(&self.slot) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CompressedResult>>(&raw) {
                Ok(results) => {
                    debug!(slot = %self.slot, count = results.len(), "loaded stored results");
                    results
                }
                Err(e) => {
                    warn!(slot = %self.slot, error = %e, "stored results are corrupt, ignoring");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "failed to read stored results");
                Vec::new()
            }
        };
        self.state = LoadState::Loaded;
        &self.results
    }

    pub fn read(&self) -> StoreView<'_> {
        match self.state {
            LoadState::Loading => StoreView::Loading,
            LoadState::Loaded => StoreView::Loaded(&self.results),
        }
    }

    /// Replace the collection. The in-memory copy is updated even when persisting fails.
    pub fn write(&mut self, results: Vec<CompressedResult>) -> PersistReport {
        self.results = results;
        self.state = LoadState::Loaded;

        let persisted = serde_json::to_string(&self.results)
            .map_err(ReduceError::from)
            .and_then(|json| self.backend.set(&self.slot, &json));
        match persisted {
            Ok(()) => {
                info!(slot = %self.slot, count = self.results.len(), "stored results");
                PersistReport::Persisted
            }
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "failed to persist results, keeping them in memory");
                PersistReport::NotPersisted(e)
            }
        }
    }

    /// Drop the collection and delete the slot.
    pub fn clear(&mut self) -> PersistReport {
        self.results.clear();
        self.state = LoadState::Loaded;
        match self.backend.remove(&self.slot) {
            Ok(()) => {
                info!(slot = %self.slot, "cleared stored results");
                PersistReport::Persisted
            }
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "failed to clear stored results");
                PersistReport::NotPersisted(e)
            }
        }
    }
}

/// Lock a shared store, recovering a poisoned lock.
pub fn lock(store: &Mutex<HandoffStore>) -> std::sync::MutexGuard<'_, HandoffStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-wide store instance.
///
/// Installed once per process with [`global::init`]; later calls fail instead of silently
/// replacing the instance. [`global::is_initialized`] makes the lifecycle observable.
pub mod global {
    use std::sync::MutexGuard;

    use once_cell::sync::OnceCell;

    use super::*;

    static HANDOFF: OnceCell<Mutex<HandoffStore>> = OnceCell::new();

    /// Install the process-wide store and perform its start-up load.
    pub fn init(backend: impl StorageBackend + 'static) -> ReduceResult<MutexGuard<'static, HandoffStore>> {
        let mut store = HandoffStore::new(backend);
        store.load();
        HANDOFF
            .set(Mutex::new(store))
            .map_err(|_| ReduceError::config("handoff_store", "", "already initialized"))?;
        handoff().ok_or_else(|| ReduceError::config("handoff_store", "", "not initialized"))
    }

    pub fn is_initialized() -> bool {
        HANDOFF.get().is_some()
    }

    /// The process-wide store without locking it, `None` before [`init`].
    pub fn store() -> Option<&'static Mutex<HandoffStore>> {
        HANDOFF.get()
    }

    /// Lock the process-wide store, `None` before [`init`].
    pub fn handoff() -> Option<MutexGuard<'static, HandoffStore>> {
        store().map(super::lock)
    }
}
