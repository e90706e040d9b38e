//! Calibration profile persistence
//!
//! The engine treats the stored profile as an opaque blob: it serializes to
//! bytes and asks a [`ProfileStore`] to keep them. Where the bytes live is up
//! to the store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::AnalysisError;

/// Load/save boundary for the persisted calibration profile
pub trait ProfileStore: Send + Sync {
    /// Read the stored blob; `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<Vec<u8>>, AnalysisError>;

    /// Replace the stored blob
    fn save(&self, bytes: &[u8]) -> Result<(), AnalysisError>;
}

/// Profile stored as a JSON file on disk
///
/// Saves go to a sibling temporary file that is renamed over the target, so
/// a crash mid-write never leaves a truncated profile behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "profile".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProfileStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<u8>>, AnalysisError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No stored profile at {:?}", self.path);
                Ok(None)
            }
            Err(e) => Err(AnalysisError::Persistence(format!(
                "Failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), AnalysisError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnalysisError::Persistence(format!(
                        "Failed to create directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        let temp = self.temp_path();
        std::fs::write(&temp, bytes).map_err(|e| {
            AnalysisError::Persistence(format!("Failed to write {:?}: {}", temp, e))
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            AnalysisError::Persistence(format!(
                "Failed to move {:?} to {:?}: {}",
                temp, self.path, e
            ))
        })?;

        log::debug!("Saved profile to {:?} ({} bytes)", self.path, bytes.len());
        Ok(())
    }
}

/// In-memory store; clones share the same blob
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `bytes`
    pub fn with_blob(bytes: Vec<u8>) -> Self {
        Self {
            blob: Arc::new(Mutex::new(Some(bytes))),
        }
    }

    /// Copy of the current blob
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.blob.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ProfileStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>, AnalysisError> {
        let guard = self
            .blob
            .lock()
            .map_err(|_| AnalysisError::Persistence("Profile store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), AnalysisError> {
        let mut guard = self
            .blob
            .lock()
            .map_err(|_| AnalysisError::Persistence("Profile store lock poisoned".to_string()))?;
        *guard = Some(bytes.to_vec());
        Ok(())
    }
}
