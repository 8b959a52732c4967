//! Worker handshake signals
//!
//! A [`Signal`] is a binary, single-slot event: raising it while it is already
//! raised has no additional effect, and one wait consumes it. Each worker owns
//! a [`WorkerSignals`] triple for the whole life of the pool.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

use crate::render::error::{RenderError, RenderResult};

/// Binary auto-reset event
#[derive(Debug)]
pub struct Signal {
    name: &'static str,
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Signal {
    /// Create a lowered signal
    pub fn new(name: &'static str) -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            name,
            sender,
            receiver,
        }
    }

    /// Name used in diagnostics
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Raise the signal; a signal that is already raised stays raised once
    pub fn raise(&self) {
        match self.sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::error!("signal '{}' raised after its receiver was dropped", self.name);
            }
        }
    }

    /// Block until raised, then lower it
    pub fn wait(&self) -> RenderResult<()> {
        self.receiver
            .recv()
            .map_err(|_| RenderError::SignalDisconnected(self.name))
    }

    /// Wait at most `timeout`; returns whether the signal was consumed
    pub fn wait_timeout(&self, timeout: Duration) -> RenderResult<bool> {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::SignalDisconnected(self.name)),
        }
    }

    /// Consume the signal if raised, without blocking
    pub fn try_wait(&self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}

/// Per-worker handshake with the orchestrator
#[derive(Debug)]
pub struct WorkerSignals {
    /// Raised by the orchestrator when a frame's ticket is published
    pub begin_frame: Signal,
    /// Raised by the worker once its shadow commands are closed
    pub shadow_done: Signal,
    /// Raised by the worker once its scene commands are closed
    pub frame_done: Signal,
}

impl WorkerSignals {
    /// Create a lowered triple
    pub fn new() -> Self {
        Self {
            begin_frame: Signal::new("begin_frame"),
            shadow_done: Signal::new("shadow_done"),
            frame_done: Signal::new("frame_done"),
        }
    }
}

impl Default for WorkerSignals {
    fn default() -> Self {
        Self::new()
    }
}
