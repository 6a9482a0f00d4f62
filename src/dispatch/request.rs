//! Validated generation request

use crate::dispatch::mode::DispatchMode;
use crate::error::{AppError, Result};
use crate::input::{InputState, ReferenceImage, MAX_BATCH_SIZE, MIN_BATCH_SIZE};

/// A request that passed every local precondition
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub intent: String,
    pub reference_image: ReferenceImage,
    pub batch_size: u32,
}

impl GenerationRequest {
    /// Check the inputs without touching the network.
    pub fn from_state(state: &InputState) -> Result<Self> {
        let intent = state.intent();
        let image = state.reference_image();

        if intent.trim().is_empty() || image.is_none() {
            return Err(AppError::Validation(
                "Please provide both a prompt and a reference layout image.".to_string(),
            ));
        }

        let batch_size = state.batch_size();
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(AppError::Validation(format!(
                "Batch size must be between {} and {}, got {}",
                MIN_BATCH_SIZE, MAX_BATCH_SIZE, batch_size
            )));
        }

        Ok(Self {
            intent: intent.to_string(),
            reference_image: image.cloned().ok_or_else(|| {
                AppError::Internal("reference image vanished during validation".to_string())
            })?,
            batch_size,
        })
    }

    pub fn mode(&self) -> DispatchMode {
        DispatchMode::for_batch_size(self.batch_size)
    }
}
