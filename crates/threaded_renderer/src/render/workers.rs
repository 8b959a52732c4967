//! Worker pool
//!
//! Each worker context owns one stride partition of the draw list and one
//! shadow/scene command-list pair per ring slot. Per frame it records the
//! shadow pass, raises `shadow_done`, records the scene pass and raises
//! `frame_done`. In [`ThreadingMode::Threaded`] every context runs on its own
//! long-lived thread; in [`ThreadingMode::Inline`] the orchestrator runs the
//! same recording functions for every context in turn.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::{ThreadingMode, Viewport};
use crate::render::commands::{Command, CommandBuffer, RootSlot, ViewBinding};
use crate::render::device::ResourceId;
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::FrameRing;
use crate::render::partition::Partition;
use crate::render::scene::DrawCall;
use crate::render::sync::WorkerSignals;

/// What the current frame records into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    /// Ring slot of the frame
    pub slot_index: usize,
    /// Back buffer the scene pass renders into
    pub render_target: ResourceId,
}

/// Resources every pass binds, created once at initialization
#[derive(Debug, Clone)]
pub struct PassResources {
    /// Viewport and scissor of both passes
    pub viewport: Viewport,
    /// Shared vertex buffer
    pub vertex_buffer: ResourceId,
    /// Bytes per vertex
    pub vertex_stride: u32,
    /// Shared index buffer
    pub index_buffer: ResourceId,
    /// Diffuse textures indexed by `DrawCall::diffuse_texture_index`
    pub diffuse_textures: Vec<ResourceId>,
    /// Depth buffer of the scene pass
    pub scene_depth: ResourceId,
}

/// State shared by the orchestrator and every worker context
pub struct RecordingContext {
    ring: FrameRing,
    draws: Vec<DrawCall>,
    resources: PassResources,
    worker_count: usize,
    ticket: Mutex<Option<FrameTicket>>,
    shutdown: AtomicBool,
    failure: Mutex<Option<(usize, RenderError)>>,
}

impl RecordingContext {
    /// Bundle the ring, draw list and pass resources for `worker_count` contexts
    pub fn new(ring: FrameRing, draws: Vec<DrawCall>, resources: PassResources, worker_count: usize) -> Self {
        Self {
            ring,
            draws,
            resources,
            worker_count,
            ticket: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    /// Frame ring
    pub const fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Pass resources
    pub const fn resources(&self) -> &PassResources {
        &self.resources
    }

    /// Number of worker contexts
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Make `ticket` the frame the next begin signal refers to
    pub fn publish_ticket(&self, ticket: FrameTicket) {
        *self.ticket.lock() = Some(ticket);
    }

    fn ticket(&self) -> RenderResult<FrameTicket> {
        self.ticket
            .lock()
            .ok_or_else(|| RenderError::Submission("no frame ticket published".to_string()))
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn record_failure(&self, worker: usize, error: RenderError) {
        log::error!("worker {worker}: {error}");
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some((worker, error));
        }
    }

    /// First recording failure since the last call
    pub fn take_failure(&self) -> Option<RenderError> {
        self.failure
            .lock()
            .take()
            .map(|(worker, source)| RenderError::WorkerFailed {
                worker,
                source: Box::new(source),
            })
    }

    fn bind_common(&self, commands: &mut CommandBuffer) -> RenderResult<()> {
        let resources = &self.resources;
        commands.record(Command::SetViewport(resources.viewport))?;
        commands.record(Command::SetVertexBuffer {
            buffer: resources.vertex_buffer,
            stride: resources.vertex_stride,
        })?;
        commands.record(Command::SetIndexBuffer(resources.index_buffer))?;
        commands.bind_table(RootSlot::Samplers, ViewBinding::Samplers)
    }

    /// Record and close the shadow list of `worker` for the published frame
    pub fn record_shadow_pass(&self, worker: usize) -> RenderResult<()> {
        let ticket = self.ticket()?;
        let slot = self.ring.acquire(ticket.slot_index);
        let mut commands = slot.shadow_list(worker);

        commands.record(Command::BeginEvent("shadow pass"))?;
        self.bind_common(&mut commands)?;
        commands.bind_table(RootSlot::DiffuseTexture, ViewBinding::Null)?;
        slot.bind_shadow_pass(&mut commands)?;

        for draw in Partition::new(&self.draws, self.worker_count, worker) {
            commands.draw_indexed(draw.index_count, draw.index_start, draw.vertex_base)?;
        }

        commands.record(Command::EndEvent)?;
        commands.close()
    }

    /// Record and close the scene list of `worker` for the published frame
    pub fn record_scene_pass(&self, worker: usize) -> RenderResult<()> {
        let ticket = self.ticket()?;
        let slot = self.ring.acquire(ticket.slot_index);
        let mut commands = slot.scene_list(worker);

        commands.record(Command::BeginEvent("scene pass"))?;
        self.bind_common(&mut commands)?;
        slot.bind_scene_pass(&mut commands, ticket.render_target, self.resources.scene_depth)?;

        for draw in Partition::new(&self.draws, self.worker_count, worker) {
            let texture = self
                .resources
                .diffuse_textures
                .get(draw.diffuse_texture_index as usize)
                .copied()
                .map_or(ViewBinding::Null, ViewBinding::Texture);
            commands.bind_table(RootSlot::DiffuseTexture, texture)?;
            commands.draw_indexed(draw.index_count, draw.index_start, draw.vertex_base)?;
        }

        commands.record(Command::EndEvent)?;
        commands.close()
    }

    fn shadow_phase(&self, worker: usize) {
        if let Err(error) = self.record_shadow_pass(worker) {
            self.record_failure(worker, error);
        }
    }

    fn scene_phase(&self, worker: usize) {
        if let Err(error) = self.record_scene_pass(worker) {
            self.record_failure(worker, error);
        }
    }
}

/// Everything one worker thread needs, handed over at spawn time
pub struct WorkerContext {
    index: usize,
    shared: Arc<RecordingContext>,
    signals: Arc<WorkerSignals>,
}

impl WorkerContext {
    fn run(self) {
        log::debug!("worker {} started", self.index);

        loop {
            if let Err(error) = self.signals.begin_frame.wait() {
                self.shared.record_failure(self.index, error);
                break;
            }
            if self.shared.is_shutting_down() {
                break;
            }

            self.shared.shadow_phase(self.index);
            self.signals.shadow_done.raise();

            self.shared.scene_phase(self.index);
            self.signals.frame_done.raise();
        }

        log::debug!("worker {} exiting", self.index);
    }
}

struct WorkerHandle {
    signals: Arc<WorkerSignals>,
    thread: Option<JoinHandle<()>>,
}

/// Fixed set of worker contexts
pub struct WorkerPool {
    shared: Arc<RecordingContext>,
    mode: ThreadingMode,
    workers: Vec<WorkerHandle>,
    stopped: bool,
}

impl WorkerPool {
    /// Start the pool; threaded mode spawns one thread per context
    pub fn spawn(shared: Arc<RecordingContext>, mode: ThreadingMode) -> RenderResult<Self> {
        let mut pool = Self {
            shared,
            mode,
            workers: Vec::new(),
            stopped: false,
        };

        if mode == ThreadingMode::Inline {
            log::info!("recording {} contexts inline", pool.shared.worker_count());
            return Ok(pool);
        }

        for index in 0..pool.shared.worker_count() {
            let signals = Arc::new(WorkerSignals::new());
            let context = WorkerContext {
                index,
                shared: Arc::clone(&pool.shared),
                signals: Arc::clone(&signals),
            };

            let thread = std::thread::Builder::new()
                .name(format!("render-worker-{index}"))
                .spawn(move || context.run());

            match thread {
                Ok(thread) => pool.workers.push(WorkerHandle {
                    signals,
                    thread: Some(thread),
                }),
                Err(source) => {
                    // joins whatever was already started
                    if let Err(error) = pool.shutdown() {
                        log::error!("cleanup after failed spawn: {error}");
                    }
                    return Err(RenderError::WorkerSpawn { worker: index, source });
                }
            }
        }

        log::info!("spawned {} worker threads", pool.workers.len());
        Ok(pool)
    }

    /// Threading mode
    pub const fn mode(&self) -> ThreadingMode {
        self.mode
    }

    /// Shared recording state
    pub fn context(&self) -> &RecordingContext {
        &self.shared
    }

    /// Publish the frame and release every worker
    pub fn begin_frame(&self, ticket: FrameTicket) {
        self.shared.publish_ticket(ticket);
        for worker in &self.workers {
            worker.signals.begin_frame.raise();
        }
    }

    /// Block until every context has closed its shadow list
    pub fn wait_shadow_done(&self) -> RenderResult<()> {
        match self.mode {
            ThreadingMode::Threaded => {
                for worker in &self.workers {
                    worker.signals.shadow_done.wait()?;
                }
            }
            ThreadingMode::Inline => {
                for index in 0..self.shared.worker_count() {
                    self.shared.shadow_phase(index);
                }
            }
        }
        Ok(())
    }

    /// Block until every context has closed its scene list
    pub fn wait_frame_done(&self) -> RenderResult<()> {
        match self.mode {
            ThreadingMode::Threaded => {
                for worker in &self.workers {
                    worker.signals.frame_done.wait()?;
                }
            }
            ThreadingMode::Inline => {
                for index in 0..self.shared.worker_count() {
                    self.shared.scene_phase(index);
                }
            }
        }
        Ok(())
    }

    /// First worker failure of the current frame
    pub fn take_failure(&self) -> Option<RenderError> {
        self.shared.take_failure()
    }

    /// Stop and join every worker thread; later calls do nothing
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        self.shared.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.signals.begin_frame.raise();
        }

        let mut result = Ok(());
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() && result.is_ok() {
                    result = Err(RenderError::WorkerPanicked { worker: index });
                }
            }
        }

        log::debug!("worker pool stopped");
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            log::error!("worker pool shutdown failed: {error}");
        }
    }
}
