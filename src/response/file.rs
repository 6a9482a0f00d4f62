//! Download directory handling for returned archives

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Give up looking for a free numbered name after this many attempts
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Handler for the download directory
pub struct FileHandler {
    download_dir: PathBuf,
    overwrite: bool,
}

impl FileHandler {
    /// Create a new file handler
    pub fn new(download_dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            download_dir: download_dir.into(),
            overwrite,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Ensure the download directory exists
    pub async fn ensure_download_dir(&self) -> Result<()> {
        if !self.download_dir.exists() {
            fs::create_dir_all(&self.download_dir).await?;
            debug!(path = ?self.download_dir, "Created download directory");
        }
        Ok(())
    }

    /// Write the payload to a hidden part file and hand back a handle to it
    pub async fn stage(&self, data: &[u8]) -> Result<StagedDownload> {
        self.ensure_download_dir().await?;

        let part_path = self.download_dir.join(format!(".{}.part", Uuid::new_v4()));
        fs::write(&part_path, data).await?;

        debug!(path = ?part_path, size = data.len(), "Staged download");

        Ok(StagedDownload {
            part_path,
            download_dir: self.download_dir.clone(),
            overwrite: self.overwrite,
            released: false,
        })
    }
}

/// Transient handle to a staged payload
///
/// Call [`StagedDownload::activate`] to save it, then [`StagedDownload::release`].
#[derive(Debug)]
pub struct StagedDownload {
    part_path: PathBuf,
    download_dir: PathBuf,
    overwrite: bool,
    released: bool,
}

impl StagedDownload {
    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Move the staged payload to `file_name` inside the download directory
    pub async fn activate(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(AppError::Delivery(format!(
                "Refusing to save under '{}'",
                file_name
            )));
        }

        let destination = if self.overwrite {
            self.download_dir.join(file_name)
        } else {
            free_destination(&self.download_dir, file_name).await?
        };

        fs::rename(&self.part_path, &destination).await?;
        debug!(path = ?destination, "Saved download");
        Ok(destination)
    }

    /// Drop the staged file if it was never activated
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.part_path).await {
            Ok(()) => {
                debug!(path = ?self.part_path, "Discarded staged download");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

impl Drop for StagedDownload {
    fn drop(&mut self) {
        if !self.released && self.part_path.exists() {
            warn!(path = ?self.part_path, "Staged download dropped without release");
            let _ = std::fs::remove_file(&self.part_path);
        }
    }
}

/// First of `name`, `stem (1).ext`, `stem (2).ext`, ... that does not exist yet
async fn free_destination(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let candidate = dir.join(file_name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    for n in 1..=MAX_NAME_ATTEMPTS {
        let name = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(AppError::Delivery(format!(
        "No free file name for '{}' in {}",
        file_name,
        dir.display()
    )))
}

/// Whether the data starts with a ZIP local file header or end-of-directory record
pub fn is_zip_archive(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06")
}
