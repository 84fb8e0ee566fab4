//! Gallery: on-disk image store, one folder per day.
//!
//! Layout: `<gallery>/<dd-mm-yy>/<index>.<ext>`.

use crate::error::StorageError;
use crate::types::ImageArtifact;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Folder (and record file) name for a day, e.g. `19-10-26`.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%d-%m-%y").to_string()
}

pub struct Gallery {
    path: PathBuf,
    extension: String,
}

impl Gallery {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.path.join(day_key(date))
    }

    pub fn image_path(&self, date: NaiveDate, index: usize) -> PathBuf {
        self.day_path(date)
            .join(format!("{}.{}", index, self.extension))
    }

    /// Write every non-empty artifact. The returned list lines up with
    /// `artifacts`; `None` marks an empty artifact or a failed write.
    pub fn save_images(
        &self,
        date: NaiveDate,
        artifacts: &[ImageArtifact],
    ) -> Result<Vec<Option<PathBuf>>, StorageError> {
        let day_path = self.day_path(date);
        std::fs::create_dir_all(&day_path)?;

        let paths = artifacts
            .iter()
            .map(|artifact| {
                if artifact.is_empty() {
                    return None;
                }
                let path = self.image_path(date, artifact.index);
                match std::fs::write(&path, artifact.bytes.as_slice()) {
                    Ok(()) => {
                        debug!(path = %path.display(), bytes = artifact.bytes.len(), "Saved image");
                        Some(path)
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to save image");
                        None
                    }
                }
            })
            .collect();
        Ok(paths)
    }

    /// Read an image back. Missing files yield `None`.
    pub fn read_image(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    /// Remove every day folder except `today`'s. Returns how many were removed.
    pub fn clean(&self, today: NaiveDate) -> Result<usize, StorageError> {
        if !self.path.is_dir() {
            return Ok(0);
        }
        let keep = day_key(today);
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || entry.file_name().to_str() == Some(keep.as_str()) {
                continue;
            }
            std::fs::remove_dir_all(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}
