//! Configuration module

pub mod settings;

pub use settings::{LoggingConfig, OutputConfig, ServiceConfig, Settings};
