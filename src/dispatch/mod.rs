//! Dispatch module - mode selection, payload construction and the dispatcher

pub mod dispatcher;
pub mod mode;
pub mod payload;
pub mod request;

pub use dispatcher::{Dispatch, RequestDispatcher};
pub use mode::DispatchMode;
pub use payload::{Payload, PayloadField};
pub use request::GenerationRequest;
