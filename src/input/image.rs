//! Reference image loading and content-type detection

use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::input::data_url;

/// A user-supplied image used to constrain generation
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    bytes: Vec<u8>,
    content_type: String,
    file_name: String,
}

impl ReferenceImage {
    /// Wrap raw bytes with an explicit content type. The type must be `image/*`.
    pub fn from_bytes(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Result<Self> {
        let content_type = content_type.into().to_ascii_lowercase();
        if !content_type.starts_with("image/") || content_type.len() == "image/".len() {
            return Err(AppError::Validation(format!(
                "Reference image must be tagged image/*, got '{}'",
                content_type
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("Reference image is empty".to_string()));
        }

        Ok(Self {
            bytes,
            content_type,
            file_name: file_name.into(),
        })
    }

    /// Read an image from disk, detecting its type from the data or the extension
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;

        let content_type = detect_image_type(&bytes)
            .or_else(|| image_type_for_extension(path))
            .ok_or_else(|| {
                AppError::Validation(format!("{} is not a recognised image", path.display()))
            })?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("reference.png")
            .to_string();

        debug!(path = ?path, content_type, size = bytes.len(), "Loaded reference image");

        Self::from_bytes(bytes, file_name, content_type)
    }

    /// Decode an inline `data:image/...;base64,` URL
    pub fn from_data_url(value: &str) -> Result<Self> {
        let bytes = data_url::decode(value)?;
        let content_type = data_url::media_type(value)
            .map(str::to_string)
            .or_else(|| detect_image_type(&bytes).map(str::to_string))
            .ok_or_else(|| AppError::Validation("Data URL has no media type".to_string()))?;

        // image/svg+xml -> svg
        let subtype = content_type.rsplit('/').next().unwrap_or("png");
        let extension = subtype.split('+').next().unwrap_or(subtype);
        let file_name = format!("reference.{}", extension);
        Self::from_bytes(bytes, file_name, content_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Detect image content type from binary data using magic bytes
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // GIF: GIF87a or GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    // BMP: BM
    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }

    None
}

fn image_type_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}
