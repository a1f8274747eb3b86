//! Recording storage collaborators.
//!
//! The conversion core consumes two interfaces from the surrounding
//! system: a blob store holding capture/video files by opaque storage
//! path, and a metadata store tracking each recording's lifecycle.
//! This module defines both traits plus the local-filesystem blob
//! store and an in-memory metadata store used by the CLI and tests.
//! (The production deployment plugs in S3 and a database behind the
//! same traits.)

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use crate::config::recordings_dir;

/// Blob storage by opaque storage path
pub trait BlobStore: Send + Sync {
    fn save(&self, path: &str, data: &[u8]) -> Result<(), String>;
    fn get(&self, path: &str) -> Result<Vec<u8>, String>;
    fn delete(&self, path: &str) -> Result<(), String>;
}

/// Lifecycle state of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Session still being captured
    Recording,
    /// Upload complete, conversion running
    Processing,
    /// Video available (possibly visually incomplete, see convert)
    Ready,
    /// Conversion aborted with a fatal error
    Failed,
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingStatus::Recording => write!(f, "recording"),
            RecordingStatus::Processing => write!(f, "processing"),
            RecordingStatus::Ready => write!(f, "ready"),
            RecordingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Metadata for one recorded session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMeta {
    /// Opaque recording identifier
    pub id: String,
    /// Current lifecycle state
    pub status: RecordingStatus,
    /// Storage path of the capture blob
    pub storage_path: String,
    /// Storage path of the converted video, once ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Creation time (Unix timestamp ms)
    pub created_ms: u64,
    /// Conversion completion time (Unix timestamp ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_ms: Option<u64>,
}

/// Recording metadata store
pub trait RecordingStore: Send + Sync {
    fn create(&self, meta: RecordingMeta) -> Result<(), String>;
    fn update_status(&self, id: &str, status: RecordingStatus) -> Result<(), String>;
    fn update_video_path(&self, id: &str, video_path: &str) -> Result<(), String>;
    fn update_completion(&self, id: &str, completed_ms: u64) -> Result<(), String>;
    fn get(&self, id: &str) -> Option<RecordingMeta>;
}

/// Local filesystem blob store under a base directory
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at the default recordings directory
    pub fn new() -> Self {
        Self::with_base_dir(recordings_dir())
    }

    /// Create with a custom base directory (for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&base_dir) {
            error!("Failed to create blob directory: {}", e);
        } else {
            debug!("Blob directory: {}", base_dir.display());
        }
        Self { base_dir }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let full = self.base_dir.join(path);
        if !self.is_safe_path(&full) {
            return Err("Invalid path".to_string());
        }
        Ok(full)
    }

    /// Check that a path stays within our base directory
    fn is_safe_path(&self, path: &Path) -> bool {
        let base = match self.base_dir.canonicalize() {
            Ok(base) => base,
            Err(_) => return false,
        };
        match path.canonicalize() {
            Ok(canonical) => canonical.starts_with(&base),
            Err(_) => {
                // Path doesn't exist yet, check parent
                match path.parent().map(|p| p.canonicalize()) {
                    Some(Ok(canonical_parent)) => canonical_parent.starts_with(&base),
                    _ => false,
                }
            }
        }
    }
}

/// A storage path must be purely relative: plain components only, no
/// `..`, no root, no drive prefix.
fn is_relative_path(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

impl Default for LocalBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for LocalBlobStore {
    fn save(&self, path: &str, data: &[u8]) -> Result<(), String> {
        // Validate before creating any directories: save() may have to
        // create the parent chain, and a traversal path must not leave
        // directories behind outside the base.
        if !is_relative_path(path) {
            return Err("Invalid path".to_string());
        }
        let full = self.base_dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create directory: {}", e))?;
        }
        let full = self.resolve(path)?;
        fs::write(&full, data).map_err(|e| format!("Failed to write blob: {}", e))?;
        info!("Stored blob: {} ({} bytes)", full.display(), data.len());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, String> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| format!("Failed to read blob {}: {}", path, e))
    }

    fn delete(&self, path: &str) -> Result<(), String> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| format!("Failed to delete blob {}: {}", path, e))?;
        info!("Deleted blob: {}", full.display());
        Ok(())
    }
}

/// In-memory metadata store for the CLI and tests
#[derive(Default)]
pub struct MemoryRecordingStore {
    inner: RwLock<HashMap<String, RecordingMeta>>,
}

impl MemoryRecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F: FnOnce(&mut RecordingMeta)>(&self, id: &str, apply: F) -> Result<(), String> {
        let mut inner = self.inner.write().unwrap();
        match inner.get_mut(id) {
            Some(meta) => {
                apply(meta);
                Ok(())
            }
            None => Err(format!("Unknown recording: {}", id)),
        }
    }
}

impl RecordingStore for MemoryRecordingStore {
    fn create(&self, meta: RecordingMeta) -> Result<(), String> {
        let mut inner = self.inner.write().unwrap();
        if inner.contains_key(&meta.id) {
            return Err(format!("Recording already exists: {}", meta.id));
        }
        inner.insert(meta.id.clone(), meta);
        Ok(())
    }

    fn update_status(&self, id: &str, status: RecordingStatus) -> Result<(), String> {
        self.update(id, |meta| meta.status = status)
    }

    fn update_video_path(&self, id: &str, video_path: &str) -> Result<(), String> {
        self.update(id, |meta| meta.video_path = Some(video_path.to_string()))
    }

    fn update_completion(&self, id: &str, completed_ms: u64) -> Result<(), String> {
        self.update(id, |meta| meta.completed_ms = Some(completed_ms))
    }

    fn get(&self, id: &str) -> Option<RecordingMeta> {
        self.inner.read().unwrap().get(id).cloned()
    }
}
