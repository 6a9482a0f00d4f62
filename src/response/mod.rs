//! Response handling module - turning a returned archive into a saved file

pub mod file;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::dispatch::mode::DispatchMode;
use crate::error::Result;

/// Binary payload of a successful generation and the name to save it under
pub struct GenerationResult {
    payload: Vec<u8>,
    suggested_name: String,
    mode: DispatchMode,
}

impl GenerationResult {
    pub fn new(mode: DispatchMode, payload: Vec<u8>) -> Self {
        Self {
            payload,
            suggested_name: mode.archive_name().to_string(),
            mode,
        }
    }

    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationResult")
            .field("suggested_name", &self.suggested_name)
            .field("mode", &self.mode)
            .field("size", &self.payload.len())
            .finish()
    }
}

/// Where a result ended up
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: usize,
    pub mode: DispatchMode,
    pub delivered_at: DateTime<Utc>,
}

/// Saves generation results into the download directory
pub struct ResponseHandler {
    file_handler: file::FileHandler,
}

impl ResponseHandler {
    /// Create a new response handler
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            file_handler: file::FileHandler::new(output.download_dir.clone(), output.overwrite),
        }
    }

    pub fn download_dir(&self) -> &std::path::Path {
        self.file_handler.download_dir()
    }

    /// Stage the payload, save it under its suggested name and release the handle.
    ///
    /// The result is consumed; nothing about it outlives the save.
    pub async fn deliver(&self, result: GenerationResult) -> Result<DeliveryReceipt> {
        let GenerationResult {
            payload,
            suggested_name,
            mode,
        } = result;

        if !file::is_zip_archive(&payload) {
            warn!(size = payload.len(), "Result does not look like a ZIP archive");
        }

        let bytes = payload.len();
        let handle = self.file_handler.stage(&payload).await?;
        drop(payload);

        let activated = handle.activate(&suggested_name).await;
        handle.release().await?;
        let path = activated?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(suggested_name.as_str())
            .to_string();

        info!(path = ?path, bytes, mode = mode.as_str(), "Archive saved");

        Ok(DeliveryReceipt {
            path,
            file_name,
            bytes,
            mode,
            delivered_at: Utc::now(),
        })
    }
}
