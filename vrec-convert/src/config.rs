//! Filesystem locations for local data.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application data directory, falling back to the working directory
/// on platforms where no home can be determined (containers).
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "vrec")
        .map(|dirs| dirs.data_dir().to_owned())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default base directory for the local blob store
pub fn recordings_dir() -> PathBuf {
    data_dir().join("recordings")
}
