//! Headless reference device
//!
//! [`HeadlessDevice`] implements [`Device`] without a GPU. Resources live in
//! host memory, and submissions run on a dedicated queue thread that tracks
//! resource states, flags invalid usage, and produces a deterministic image
//! for every presented frame. Tests use its inspection methods to observe
//! what the frame pipeline did.

mod executor;
mod queue;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use self::executor::{ResourceData, ResourceTable};
use self::queue::{QueueOp, QueueShared};
use crate::config::RendererConfig;
use crate::render::commands::{RecordedCommands, ResourceState};
use crate::render::device::{Device, ResourceId, TextureDesc, TextureFormat};
use crate::render::error::{RenderError, RenderResult};

/// Something the queue thread processed, in processing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A batch of command lists ran
    Execute {
        /// Labels of the lists in submission order
        labels: Vec<String>,
        /// Draws rasterized across the batch
        draw_count: usize,
    },
    /// The fence reached a value
    Signal(u64),
    /// A back buffer was presented
    Present {
        /// Swap-chain index of the presented buffer
        back_buffer: usize,
    },
}

/// Headless device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Number of swap-chain back buffers
    pub back_buffer_count: usize,
    /// Back buffer width
    pub width: u32,
    /// Back buffer height
    pub height: u32,
    /// Time the queue spends on every executed batch
    pub execute_latency: Duration,
}

impl HeadlessConfig {
    /// Configuration with one back buffer per frame in flight
    pub fn from_renderer(config: &RendererConfig) -> Self {
        Self {
            back_buffer_count: config.ring_depth,
            width: config.viewport.width,
            height: config.viewport.height,
            execute_latency: Duration::ZERO,
        }
    }

    /// Set the per-batch latency
    pub fn with_execute_latency(mut self, latency: Duration) -> Self {
        self.execute_latency = latency;
        self
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self::from_renderer(&RendererConfig::default())
    }
}

/// CPU-backed [`Device`] with an asynchronous queue thread
pub struct HeadlessDevice {
    config: HeadlessConfig,
    shared: Arc<QueueShared>,
    ops: Sender<QueueOp>,
    queue_thread: Mutex<Option<JoinHandle<()>>>,
    back_buffers: Vec<ResourceId>,
    current_back_buffer: AtomicUsize,
    creation_budget: Mutex<Option<usize>>,
}

impl HeadlessDevice {
    /// Create the device and start its queue
    pub fn new(config: HeadlessConfig) -> RenderResult<Self> {
        if config.back_buffer_count == 0 {
            return Err(RenderError::resource("swap chain", "at least one back buffer is required"));
        }

        let texel_count = config.width as usize * config.height as usize;
        let mut resources = ResourceTable::default();
        let back_buffers = (0..config.back_buffer_count)
            .map(|index| {
                resources.insert(
                    &format!("back_buffer[{index}]"),
                    ResourceData::Color(vec![0; texel_count]),
                    ResourceState::Present,
                )
            })
            .collect();

        let shared = Arc::new(QueueShared::new(resources));
        let (ops, receiver) = unbounded();
        let queue_thread = queue::spawn(Arc::clone(&shared), receiver, config.execute_latency)?;

        log::info!(
            "headless device: {} back buffers at {}x{}, latency {:?}",
            config.back_buffer_count,
            config.width,
            config.height,
            config.execute_latency
        );

        Ok(Self {
            config,
            shared,
            ops,
            queue_thread: Mutex::new(Some(queue_thread)),
            back_buffers,
            current_back_buffer: AtomicUsize::new(0),
            creation_budget: Mutex::new(None),
        })
    }

    /// Device configuration
    pub const fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Stop the queue from processing; submissions keep queueing
    pub fn pause(&self) {
        log::debug!("headless queue paused");
        self.shared.set_paused(true);
    }

    /// Let the queue drain again
    pub fn resume(&self) {
        log::debug!("headless queue resumed");
        self.shared.set_paused(false);
    }

    /// Make every resource creation after the next `count` fail
    pub fn fail_resource_creation_after(&self, count: usize) {
        *self.creation_budget.lock() = Some(count);
    }

    /// Events the queue has processed so far
    pub fn queue_log(&self) -> Vec<QueueEvent> {
        self.shared.events.lock().clone()
    }

    /// Every executed transition of `id`, as `(before, after)`
    pub fn transition_log(&self, id: ResourceId) -> Vec<(ResourceState, ResourceState)> {
        self.shared
            .resources
            .lock()
            .get(id)
            .map(|resource| resource.transitions.clone())
            .unwrap_or_default()
    }

    /// Current state of a resource
    pub fn resource_state(&self, id: ResourceId) -> Option<ResourceState> {
        self.shared.resources.lock().get(id).map(|resource| resource.state)
    }

    /// Bytes of a buffer as the queue currently sees them
    pub fn buffer_contents(&self, id: ResourceId) -> Option<Vec<u8>> {
        match &self.shared.resources.lock().get(id)?.data {
            ResourceData::Buffer(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Invalid usage detected by the queue
    pub fn validation_errors(&self) -> Vec<String> {
        self.shared.resources.lock().validation_errors().to_vec()
    }

    /// Texels of the most recently presented back buffer
    pub fn front_buffer(&self) -> Vec<u32> {
        self.shared.front_buffer.lock().clone()
    }

    /// Number of presents the queue has processed
    pub fn presented_frames(&self) -> u64 {
        self.shared.presented.load(Ordering::Acquire)
    }

    fn consume_creation_budget(&self, label: &str) -> RenderResult<()> {
        let mut budget = self.creation_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(RenderError::resource(label, "device out of memory")),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn send(&self, op: QueueOp) -> RenderResult<()> {
        self.ops
            .send(op)
            .map_err(|_| RenderError::DeviceLost("queue thread has exited".to_string()))
    }
}

impl Device for HeadlessDevice {
    fn create_buffer(&self, label: &str, bytes: &[u8]) -> RenderResult<ResourceId> {
        self.consume_creation_budget(label)?;
        let id = self.shared.resources.lock().insert(
            label,
            ResourceData::Buffer(bytes.to_vec()),
            ResourceState::GenericRead,
        );
        log::debug!("created buffer '{label}' {id} ({} bytes)", bytes.len());
        Ok(id)
    }

    fn create_upload_buffer(&self, label: &str, size: usize) -> RenderResult<ResourceId> {
        self.consume_creation_budget(label)?;
        let id = self.shared.resources.lock().insert(
            label,
            ResourceData::Buffer(vec![0; size]),
            ResourceState::GenericRead,
        );
        log::debug!("created upload buffer '{label}' {id} ({size} bytes)");
        Ok(id)
    }

    fn write_upload_buffer(&self, id: ResourceId, bytes: &[u8]) -> RenderResult<()> {
        let mut resources = self.shared.resources.lock();
        let resource = resources
            .get_mut(id)
            .ok_or_else(|| RenderError::Submission(format!("write to unknown buffer {id}")))?;

        match &mut resource.data {
            ResourceData::Buffer(data) if resource.state == ResourceState::GenericRead && bytes.len() <= data.len() => {
                data[..bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(RenderError::Submission(format!(
                "'{}' is not an upload buffer of at least {} bytes",
                resource.label,
                bytes.len()
            ))),
        }
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> RenderResult<ResourceId> {
        self.consume_creation_budget(desc.label)?;

        let texel_count = desc.width as usize * desc.height as usize;
        let data = match (desc.format, desc.initial_data) {
            (TextureFormat::Depth32Float, None) => ResourceData::Depth(vec![1.0; texel_count]),
            (TextureFormat::Rgba8Unorm, None) => ResourceData::Color(vec![0; texel_count]),
            (TextureFormat::Rgba8Unorm, Some(pixels)) if pixels.len() == texel_count => {
                ResourceData::Color(pixels.to_vec())
            }
            (format, Some(pixels)) => {
                return Err(RenderError::resource(
                    desc.label,
                    format!(
                        "{} initial texels do not fit a {}x{} {format:?} texture",
                        pixels.len(),
                        desc.width,
                        desc.height
                    ),
                ));
            }
        };

        let id = self.shared.resources.lock().insert(desc.label, data, desc.initial_state);
        log::debug!(
            "created texture '{}' {id} ({}x{} {:?}, {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            desc.initial_state
        );
        Ok(id)
    }

    fn back_buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    fn back_buffer(&self, index: usize) -> RenderResult<ResourceId> {
        self.back_buffers.get(index).copied().ok_or_else(|| {
            RenderError::resource(
                format!("back_buffer[{index}]"),
                format!("swap chain has {} buffers", self.back_buffers.len()),
            )
        })
    }

    fn current_back_buffer_index(&self) -> usize {
        self.current_back_buffer.load(Ordering::Acquire)
    }

    fn execute(&self, batch: &[RecordedCommands]) -> RenderResult<()> {
        self.send(QueueOp::Execute(batch.to_vec()))
    }

    fn signal(&self, value: u64) -> RenderResult<()> {
        self.send(QueueOp::Signal(value))
    }

    fn completed_value(&self) -> u64 {
        self.shared.completed_value()
    }

    fn wait_for_value(&self, value: u64) -> RenderResult<()> {
        self.shared.wait_for_value(value)
    }

    fn present(&self) -> RenderResult<()> {
        let index = self.current_back_buffer_index();
        let back_buffer = self.back_buffer(index)?;
        self.send(QueueOp::Present { index, back_buffer })?;
        self.current_back_buffer
            .store((index + 1) % self.back_buffers.len(), Ordering::Release);
        Ok(())
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        self.resume();
        if self.ops.send(QueueOp::Shutdown).is_err() {
            log::warn!("headless queue exited before shutdown");
        }
        if let Some(handle) = self.queue_thread.lock().take() {
            if handle.join().is_err() {
                log::error!("headless queue thread panicked");
            }
        }
    }
}
