//! Base64 data URL decoding for inline reference images

use base64::{engine::general_purpose::STANDARD, Engine};
use crate::error::{AppError, Result};

/// Decode the payload of a data URL (or a bare base64 string) to binary data
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    // Handle data URL format (e.g., "data:image/png;base64,...")
    let data = match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    };

    STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::Validation(format!("Invalid base64 image data: {}", e)))
}

/// Get the media type from a data URL prefix, e.g. `image/png`
pub fn media_type(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    let media = &rest[..end];
    if media.is_empty() {
        None
    } else {
        Some(media)
    }
}

/// Check whether a string looks like a data URL
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:") && value.contains(',')
}
