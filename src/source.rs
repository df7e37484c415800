//! Station file binding.
//!
//! A path is checked the moment it is bound, so callers learn about a bad
//! path immediately instead of at the first read.

use crate::error::{ClimateError, Result};
use crate::models::SourceMetadata;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A readable file on disk plus the metadata captured when it was bound
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    metadata: SourceMetadata,
}

impl SourceFile {
    /// Bind a path, expanding a leading `~` to the home directory
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let file_path = expand_home(path.as_ref());

        let fs_metadata = fs::metadata(&file_path)
            .map_err(|e| ClimateError::invalid_path(&file_path, e.to_string()))?;

        if !fs_metadata.is_file() {
            return Err(ClimateError::invalid_path(
                &file_path,
                "not a regular file",
            ));
        }

        // Readability is part of the contract, not just existence
        File::open(&file_path)
            .map_err(|e| ClimateError::invalid_path(&file_path, e.to_string()))?;

        let modified = DateTime::<Local>::from(fs_metadata.modified()?);
        let created = fs_metadata.created().ok().map(DateTime::<Local>::from);

        let file_dir = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "Bound {} ({} bytes, modified {})",
            file_path.display(),
            fs_metadata.len(),
            modified
        );

        Ok(Self {
            metadata: SourceMetadata {
                file_path,
                file_dir,
                file_name,
                created,
                modified,
                filesize_bytes: fs_metadata.len(),
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.metadata.file_path
    }

    pub fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    /// True when this binding points at a different file than `earlier`,
    /// or at the same file after it was rewritten
    pub fn differs_from(&self, earlier: &SourceFile) -> bool {
        let (now, then) = (&self.metadata, &earlier.metadata);
        now.file_path != then.file_path
            || now.modified != then.modified
            || now.filesize_bytes != then.filesize_bytes
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
