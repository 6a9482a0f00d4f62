//! Backend module - service trait and HTTP client

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpBackend;
pub use traits::GenerationBackend;
