//! Render error types
//!
//! Every variant except `InvalidConfig` is fatal: device state and frame ring
//! bookkeeping cannot be rolled back mid-frame, so callers are expected to
//! stop rendering and tear down rather than retry.

use crate::config::ConfigError;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Rendering errors
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// A device resource could not be created
    #[error("Resource creation failed for '{label}': {reason}")]
    ResourceCreation {
        /// Debug label of the resource
        label: String,
        /// Why the device refused the allocation
        reason: String,
    },

    /// A batch, fence signal or present could not be queued
    #[error("Queue submission failed: {0}")]
    Submission(String),

    /// The device stopped processing work
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// A command was recorded into a closed command buffer
    #[error("Command buffer '{label}' is closed")]
    CommandBufferClosed {
        /// Debug label of the command buffer
        label: String,
    },

    /// A command buffer was submitted while still recording
    #[error("Command buffer '{label}' was submitted while still recording")]
    CommandBufferNotClosed {
        /// Debug label of the command buffer
        label: String,
    },

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker thread {worker}: {source}")]
    WorkerSpawn {
        /// Worker index
        worker: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A worker failed while recording its passes
    #[error("Worker {worker} failed: {source}")]
    WorkerFailed {
        /// Worker index
        worker: usize,
        /// The recording error
        #[source]
        source: Box<RenderError>,
    },

    /// A worker thread panicked and could not be joined
    #[error("Worker {worker} panicked")]
    WorkerPanicked {
        /// Worker index
        worker: usize,
    },

    /// A synchronization primitive lost its peer
    #[error("Signal '{0}' disconnected")]
    SignalDisconnected(&'static str),

    /// Configuration rejected at initialization
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl RenderError {
    /// Shorthand for a resource creation failure
    pub fn resource(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceCreation {
            label: label.into(),
            reason: reason.into(),
        }
    }
}
