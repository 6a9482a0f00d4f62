//! Single vs. batch dispatch

use serde::Serialize;

/// Derived from the batch size; picks endpoint, payload shape and file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Single,
    Batch,
}

impl DispatchMode {
    pub fn for_batch_size(batch_size: u32) -> Self {
        if batch_size > 1 {
            Self::Batch
        } else {
            Self::Single
        }
    }

    /// File name the returned archive is saved under
    pub fn archive_name(self) -> &'static str {
        match self {
            Self::Single => "edgeforge_asset.zip",
            Self::Batch => "edgeforge_dataset.zip",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
        }
    }
}
