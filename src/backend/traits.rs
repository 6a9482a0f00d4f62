//! Boundary to the external generation service

use async_trait::async_trait;

use crate::dispatch::payload::Payload;
use crate::error::Result;

/// Anything that can turn a payload into an archive
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Send the payload to the endpoint for its mode and return the raw response body.
    ///
    /// A non-success response must be reported as an error; no retry is attempted.
    async fn submit(&self, payload: Payload) -> Result<Vec<u8>>;
}
