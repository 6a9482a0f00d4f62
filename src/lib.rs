//! EdgeForge client
//!
//! Turns a natural-language intent and a reference image into a request
//! against the EdgeForge generation service, and saves the archive it
//! returns. Single-shot requests (batch size 1) and batch requests (2-10)
//! go to different endpoints and are saved under different names.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod response;
pub mod status;

pub use dispatch::{Dispatch, DispatchMode, RequestDispatcher};
pub use error::{AppError, ErrorKind, Result};
pub use input::{InputState, ReferenceImage};
pub use response::{DeliveryReceipt, GenerationResult, ResponseHandler};
pub use status::{LifecycleState, Phase, StatusReporter};
