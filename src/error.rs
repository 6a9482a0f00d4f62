//! Common error types for the EdgeForge client

use thiserror::Error;

use crate::status::Phase;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Generation service error: {0}")]
    Transport(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Illegal status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure is presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected locally before any network activity
    Validation,
    /// Anything that went wrong once a request was under way
    Transport,
}

impl AppError {
    /// Collapse the error into the two user-visible categories.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Transport,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
