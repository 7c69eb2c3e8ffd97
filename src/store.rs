//! Persistence
//!
//! The server keeps its durable state (history, every user ever seen, block
//! lists) behind the synchronous [`StateStore`] interface. It is loaded once
//! at startup and saved after each registered user's disconnect and on
//! shutdown.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::block::BlockGraph;
use crate::error::StoreError;
use crate::history::HistoryLog;

/// Everything that outlives the process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub history: HistoryLog,
    #[serde(default)]
    pub all_users: BTreeSet<String>,
    #[serde(default)]
    pub blocks: BlockGraph,
}

/// Load/save collaborator
pub trait StateStore: Send + 'static {
    fn load(&self) -> Result<PersistedState, StoreError>;

    fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

/// JSON file on disk
///
/// A missing file means a fresh server and loads as empty state.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        // Write-then-rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<PersistedState>>,
}

impl MemoryStore {
    pub fn new(state: PersistedState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the last saved state
    pub fn snapshot(&self) -> PersistedState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = state.clone();
        Ok(())
    }
}
