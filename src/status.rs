//! Lifecycle phases of a generation request and their status text
//!
//! The reporter never talks to the network. Only the dispatcher drives it;
//! outside the crate it can be observed but not moved. Any transition outside
//! the table in [`Phase::can_transition_to`] is rejected, except when a
//! request is abandoned mid-flight and its phase is forced to `Error`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::dispatch::mode::DispatchMode;
use crate::error::{AppError, Result};

/// Coarse phase of the request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ready,
    /// Batch request accepted, variations being planned
    Planning,
    /// Single request accepted, intent being analyzed
    Analyzing,
    Forging,
    Success,
    Error,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Ready, Planning | Analyzing)
                | (Planning | Analyzing, Forging)
                | (Forging, Success | Error)
                | (Success | Error, Ready)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Error)
    }

    /// A request owns the reporter in this phase
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Planning | Phase::Analyzing | Phase::Forging)
    }

    /// Human-readable status line for this phase
    pub fn status_text(self, batch_size: u32) -> String {
        match self {
            Phase::Ready => "Ready".to_string(),
            Phase::Planning => format!("Director: Planning {} variations...", batch_size),
            Phase::Analyzing => "Director: Analyzing intent...".to_string(),
            Phase::Forging => format!(
                "Artist: Forging dataset ({} items)... This may take time.",
                batch_size
            ),
            Phase::Success => "Success! Dataset downloaded.".to_string(),
            Phase::Error => "Error: Generation failed. Check backend console.".to_string(),
        }
    }
}

/// What presentation renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleState {
    pub phase: Phase,
    pub busy: bool,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

struct Inner {
    phase: Phase,
    busy: bool,
    batch_size: u32,
}

impl Inner {
    fn publish(&self) -> LifecycleState {
        LifecycleState {
            phase: self.phase,
            busy: self.busy,
            status: self.phase.status_text(self.batch_size),
            updated_at: Utc::now(),
        }
    }
}

/// State machine mapping dispatch lifecycle to status text
pub struct StatusReporter {
    inner: Mutex<Inner>,
    tx: watch::Sender<LifecycleState>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter {
    pub fn new() -> Self {
        let inner = Inner {
            phase: Phase::Ready,
            busy: false,
            batch_size: 1,
        };
        let (tx, _) = watch::channel(inner.publish());
        Self {
            inner: Mutex::new(inner),
            tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn snapshot(&self) -> LifecycleState {
        self.tx.borrow().clone()
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Enter `Planning` or `Analyzing` for a new request.
    ///
    /// A terminal phase from the previous request is reset to `Ready` first.
    pub(crate) fn begin(&self, mode: DispatchMode, batch_size: u32) -> Result<()> {
        let next = match mode {
            DispatchMode::Batch => Phase::Planning,
            DispatchMode::Single => Phase::Analyzing,
        };

        let mut inner = self.inner.lock();
        if inner.phase.is_terminal() {
            self.transition(&mut inner, Phase::Ready)?;
        }
        if !inner.phase.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: inner.phase,
                to: next,
            });
        }
        inner.batch_size = batch_size;
        self.transition(&mut inner, next)
    }

    pub(crate) fn advance(&self, next: Phase) -> Result<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, next)
    }

    /// Settle a request that ended without reaching a terminal phase.
    ///
    /// Moves any in-flight phase straight to `Error`, bypassing the table.
    /// Returns whether the phase changed.
    pub(crate) fn abandon(&self) -> bool {
        let mut inner = self.inner.lock();
        let from = inner.phase;
        if !from.is_in_flight() {
            return false;
        }
        inner.phase = Phase::Error;
        warn!(from = ?from, "Request ended before settling, status forced to error");
        self.tx.send_replace(inner.publish());
        true
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        let mut inner = self.inner.lock();
        inner.busy = busy;
        self.tx.send_replace(inner.publish());
    }

    fn transition(&self, inner: &mut Inner, next: Phase) -> Result<()> {
        let from = inner.phase;
        if !from.can_transition_to(next) {
            return Err(AppError::InvalidTransition { from, to: next });
        }
        inner.phase = next;
        debug!(from = ?from, to = ?next, "Status transition");
        self.tx.send_replace(inner.publish());
        Ok(())
    }
}
