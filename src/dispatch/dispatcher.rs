//! Request dispatcher: validate, send, deliver, at most one request at a time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::{GenerationBackend, HttpBackend};
use crate::config::Settings;
use crate::dispatch::payload::Payload;
use crate::dispatch::request::GenerationRequest;
use crate::error::Result;
use crate::input::InputState;
use crate::response::{DeliveryReceipt, GenerationResult, ResponseHandler};
use crate::status::{LifecycleState, Phase, StatusReporter};

/// Outcome of a `generate` call that did not fail
#[derive(Debug)]
pub enum Dispatch {
    /// The archive was received and saved
    Delivered(DeliveryReceipt),
    /// Another request was already in flight; nothing was sent
    Skipped,
}

/// Settles the phase and clears `busy` when dropped, whatever path leaves
/// `generate`, including a dropped future or a panicking backend
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    status: &'a StatusReporter,
}

impl<'a> BusyGuard<'a> {
    fn acquire(busy: &'a AtomicBool, status: &'a StatusReporter) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        status.set_busy(true);
        Some(Self { busy, status })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.status.abandon();
        self.busy.store(false, Ordering::Release);
        self.status.set_busy(false);
    }
}

/// Owns the in-flight request and the `busy` flag
pub struct RequestDispatcher {
    backend: Arc<dyn GenerationBackend>,
    handler: ResponseHandler,
    status: Arc<StatusReporter>,
    busy: AtomicBool,
}

impl RequestDispatcher {
    pub fn new(backend: Arc<dyn GenerationBackend>, handler: ResponseHandler) -> Self {
        Self::with_status(backend, handler, Arc::new(StatusReporter::new()))
    }

    /// Report lifecycle changes through an existing reporter
    pub fn with_status(
        backend: Arc<dyn GenerationBackend>,
        handler: ResponseHandler,
        status: Arc<StatusReporter>,
    ) -> Self {
        Self {
            backend,
            handler,
            status,
            busy: AtomicBool::new(false),
        }
    }

    /// HTTP backend and download directory taken from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = HttpBackend::new(&settings.service)?;
        Ok(Self::new(
            Arc::new(backend),
            ResponseHandler::new(&settings.output),
        ))
    }

    pub fn status(&self) -> Arc<StatusReporter> {
        self.status.clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.status.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Validate the inputs, send them to the service and save the returned archive.
    ///
    /// Invalid inputs fail with a validation error before anything is sent and
    /// leave the phase untouched. A call made while another request is in
    /// flight returns [`Dispatch::Skipped`].
    pub async fn generate(&self, state: &InputState) -> Result<Dispatch> {
        let request = GenerationRequest::from_state(state)?;

        let Some(_guard) = BusyGuard::acquire(&self.busy, &self.status) else {
            debug!("Generate ignored, a request is already in flight");
            return Ok(Dispatch::Skipped);
        };

        let mode = request.mode();
        let batch_size = request.batch_size;
        let payload = Payload::from_request(&request);
        drop(request);

        self.status.begin(mode, batch_size)?;
        info!(
            backend = %self.backend.name(),
            mode = mode.as_str(),
            batch_size,
            "Dispatching generation request"
        );
        self.status.advance(Phase::Forging)?;

        let outcome: Result<DeliveryReceipt> = async {
            let archive = self.backend.submit(payload).await?;
            self.handler
                .deliver(GenerationResult::new(mode, archive))
                .await
        }
        .await;

        match outcome {
            Ok(receipt) => {
                if let Err(e) = self.status.advance(Phase::Success) {
                    warn!(
                        error = %e,
                        path = ?receipt.path,
                        "Archive saved but status not updated"
                    );
                }
                Ok(Dispatch::Delivered(receipt))
            }
            Err(e) => {
                error!(error = %e, mode = mode.as_str(), "Generation failed");
                if let Err(t) = self.status.advance(Phase::Error) {
                    warn!(error = %t, "Failed to record error status");
                }
                Err(e)
            }
        }
    }
}
