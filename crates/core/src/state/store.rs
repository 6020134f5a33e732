//! JSON-file backed state store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{CycleState, StateError};

/// Reads and writes [`CycleState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing file yields defaults. An unreadable or corrupt file is logged
    /// and also yields defaults.
    pub fn load(&self) -> CycleState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, using defaults");
                return CycleState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read state file, using defaults");
                return CycleState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt state file, using defaults");
                CycleState::default()
            }
        }
    }

    /// Persist the state.
    ///
    /// Writes a sibling temp file and renames it over the target, creating the
    /// parent directory if needed.
    pub fn save(&self, state: &CycleState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
