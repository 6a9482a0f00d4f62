//! HTTP client for the generation service

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::backend::traits::GenerationBackend;
use crate::config::ServiceConfig;
use crate::dispatch::mode::DispatchMode;
use crate::dispatch::payload::Payload;
use crate::error::{AppError, Result};

/// Longest slice of an error body kept in the error message
const ERROR_BODY_LIMIT: usize = 512;

/// Generation service reached over HTTP with multipart bodies
pub struct HttpBackend {
    name: String,
    client: Client,
    single_url: Url,
    batch_url: Url,
}

impl HttpBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(service: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Self::with_client(client, service)
    }

    pub fn with_client(client: Client, service: &ServiceConfig) -> Result<Self> {
        let base = Url::parse(&service.base_url).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid service base_url '{}': {}",
                service.base_url, e
            )))
        })?;

        Ok(Self {
            name: base.host_str().unwrap_or("generation-service").to_string(),
            client,
            single_url: join(&base, &service.single_path)?,
            batch_url: join(&base, &service.batch_path)?,
        })
    }

    /// Endpoint addressed by a dispatch mode
    pub fn endpoint(&self, mode: DispatchMode) -> &Url {
        match mode {
            DispatchMode::Single => &self.single_url,
            DispatchMode::Batch => &self.batch_url,
        }
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    // Keep any path prefix on the base, e.g. http://host/api + /generate
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| {
        AppError::Config(config::ConfigError::Message(format!(
            "Invalid endpoint '{}': {}",
            joined, e
        )))
    })
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, payload: Payload) -> Result<Vec<u8>> {
        let mode = payload.mode;
        let url = self.endpoint(mode).clone();
        let form = payload.into_form()?;

        debug!(backend = %self.name, url = %url, mode = mode.as_str(), "Sending generate request");

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AppError::Transport(format!("Connection failed to {}: {}", url, e))
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(AppError::Transport(format!(
                "Service returned {}: {}",
                status, excerpt
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty()
            && !content_type.starts_with("application/zip")
            && !content_type.starts_with("application/octet-stream")
        {
            warn!(backend = %self.name, content_type = %content_type, "Unexpected response content type");
        }

        let body = response.bytes().await?;
        debug!(backend = %self.name, size = body.len(), "Received archive");
        Ok(body.to_vec())
    }
}
