//! Persistent flat key-value map for backend bookkeeping.
//!
//! Stored as a JSON object next to the calendar file. Every mutation is
//! written through immediately unless the map is frozen.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StoreResult;
use crate::persist::{remove_if_exists, write_atomically};

#[derive(Debug, Default)]
struct KeyState {
    values: BTreeMap<String, String>,
    frozen: u32,
    dirty: bool,
}

#[derive(Debug)]
pub struct KeyFile {
    path: PathBuf,
    state: Mutex<KeyState>,
}

impl KeyFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(KeyState::default()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file, replacing the in-memory map.
    ///
    /// A missing or unreadable file starts an empty map and writes a fresh
    /// file; only a failure to write that file is reported.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> bool {
        let mut state = self.state.lock();
        match read_map(&self.path) {
            Ok(values) => {
                tracing::trace!(count = values.len(), "Loaded key file");
                state.values = values;
                state.dirty = false;
                true
            }
            Err(err) => {
                if !is_not_found(&err) {
                    tracing::warn!(%err, "Key file unreadable, starting empty");
                }
                state.values.clear();
                state.dirty = false;
                match write_map(&self.path, &state.values) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(%err, "Failed to create key file");
                        false
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.lock().values.get(key).cloned()
    }

    /// Sets `key` to `value`, or removes it when `value` is `None`.
    ///
    /// Returns `false` when removing a key that is not present, or if the
    /// change could not be written.
    pub fn put(&self, key: &str, value: Option<&str>) -> bool {
        let mut state = self.state.lock();
        match value {
            Some(value) => {
                let previous = state.values.insert(key.to_string(), value.to_string());
                if previous.as_deref() == Some(value) {
                    return true;
                }
            }
            None => {
                if state.values.remove(key).is_none() {
                    return false;
                }
            }
        }
        state.dirty = true;
        self.write_if_thawed(&mut state)
    }

    pub fn freeze(&self) {
        self.state.lock().frozen += 1;
    }

    /// Ends one freeze; the outermost thaw writes pending changes.
    pub fn thaw(&self) -> bool {
        let mut state = self.state.lock();
        if state.frozen == 0 {
            tracing::warn!(path = %self.path.display(), "Key file thawed without a freeze");
            return true;
        }
        state.frozen -= 1;
        self.write_if_thawed(&mut state)
    }

    /// Empties the map and writes the empty file.
    pub fn clean(&self) -> bool {
        let mut state = self.state.lock();
        state.values.clear();
        state.dirty = true;
        self.write_if_thawed(&mut state)
    }

    /// Deletes the file, and its directory if nothing else is left in it.
    ///
    /// ## Errors
    /// Returns `StoreError::IoError` if the file exists but cannot be
    /// deleted.
    pub fn remove(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.values.clear();
        state.dirty = false;
        remove_if_exists(&self.path)?;
        if let Some(dir) = self.path.parent() {
            // Fails harmlessly when other files remain.
            if fs::remove_dir(dir).is_ok() {
                tracing::debug!(dir = %dir.display(), "Removed empty store directory");
            }
        }
        Ok(())
    }

    fn write_if_thawed(&self, state: &mut KeyState) -> bool {
        if state.frozen > 0 || !state.dirty {
            return true;
        }
        match write_map(&self.path, &state.values) {
            Ok(()) => {
                state.dirty = false;
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "Failed to write key file");
                false
            }
        }
    }
}

fn read_map(path: &Path) -> StoreResult<BTreeMap<String, String>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_map(path: &Path, values: &BTreeMap<String, String>) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(values)?;
    write_atomically(path, &json)
}

fn is_not_found(err: &crate::error::StoreError) -> bool {
    matches!(err, crate::error::StoreError::IoError(io) if io.kind() == ErrorKind::NotFound)
}
