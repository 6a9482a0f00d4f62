//! User inputs for a generation request
//!
//! [`InputState`] only stores what the user picked. Whether the combination
//! is dispatchable is decided by the dispatcher.

pub mod data_url;
pub mod image;

pub use image::ReferenceImage;

/// Smallest accepted batch size
pub const MIN_BATCH_SIZE: u32 = 1;
/// Largest accepted batch size
pub const MAX_BATCH_SIZE: u32 = 10;
/// Batch size of a fresh input state (single-shot)
pub const DEFAULT_BATCH_SIZE: u32 = 1;

/// Clamp a raw value into the accepted batch size range
pub fn clamp_batch_size(n: u32) -> u32 {
    n.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// Current prompt, reference image and batch size selection
#[derive(Debug, Clone)]
pub struct InputState {
    intent: String,
    reference_image: Option<ReferenceImage>,
    batch_size: u32,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            intent: String::new(),
            reference_image: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_intent(&mut self, intent: impl Into<String>) {
        self.intent = intent.into();
    }

    pub fn set_reference_image(&mut self, image: ReferenceImage) {
        self.reference_image = Some(image);
    }

    pub fn clear_reference_image(&mut self) {
        self.reference_image = None;
    }

    /// Overwrite the batch size as given by the input control.
    pub fn set_batch_size(&mut self, n: u32) {
        self.batch_size = n;
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        self.reference_image.as_ref()
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }
}
