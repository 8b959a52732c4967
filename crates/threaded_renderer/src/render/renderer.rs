//! Frame orchestration
//!
//! [`FrameRenderer`] drives one frame at a time through the ring:
//!
//! 1. wait until the next slot's previous submission retired, then reset it
//!    and write its constant buffers
//! 2. record the pre list and release the workers
//! 3. once every shadow list is closed, submit `[pre, shadow.., mid]`
//! 4. once every scene list is closed, submit `[scene.., post]`
//! 5. present, signal the fence and tag the slot with the new value
//!
//! The shadow batch is always queued before the scene batch that samples the
//! shadow map.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RendererConfig;
use crate::foundation::time::FrameStats;
use crate::render::camera::Camera;
use crate::render::commands::{Command, ResourceState};
use crate::render::device::{Device, ResourceId, TextureDesc};
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::{FrameList, FrameResourceSlot, FrameRing, RetireWait};
use crate::render::lighting::LightRig;
use crate::render::scene::SceneDescription;
use crate::render::workers::{FrameTicket, PassResources, RecordingContext, WorkerPool};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const CLEAR_DEPTH: f32 = 1.0;

/// What happened while rendering one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Zero-based frame counter
    pub frame_number: u64,
    /// Ring slot the frame used
    pub slot_index: usize,
    /// Wait for the slot's previous submission
    pub retire_wait: RetireWait,
    /// Device fence value observed right before the slot was reset
    pub completed_at_reset: u64,
    /// Fence value signaled after this frame's present
    pub fence_value: u64,
    /// Host time spent from the retire wait to the fence signal
    pub cpu_time: Duration,
}

/// Multithreaded frame pipeline
pub struct FrameRenderer {
    device: Arc<dyn Device>,
    config: RendererConfig,
    shared: Arc<RecordingContext>,
    pool: WorkerPool,
    next_slot: usize,
    fence_value: u64,
    frame_number: u64,
    stats: FrameStats,
    failed: bool,
    shut_down: bool,
}

impl FrameRenderer {
    /// Upload the scene, build the frame ring and start the worker pool
    pub fn new<D: Device + 'static>(
        device: Arc<D>,
        scene: SceneDescription,
        config: &RendererConfig,
    ) -> RenderResult<Self> {
        let device: Arc<dyn Device> = device;
        config.validate()?;

        if device.back_buffer_count() == 0 {
            return Err(RenderError::resource("swap chain", "device has no back buffers"));
        }
        if let Some((index, draw)) = scene
            .draws
            .iter()
            .enumerate()
            .find(|(_, draw)| draw.diffuse_texture_index as usize >= scene.textures.len())
        {
            return Err(RenderError::resource(
                format!("draw[{index}]"),
                format!(
                    "diffuse texture {} out of {} textures",
                    draw.diffuse_texture_index,
                    scene.textures.len()
                ),
            ));
        }

        log::info!(
            "initializing frame renderer: {} draws, {} workers, {} frames in flight, {:?}",
            scene.draw_count(),
            config.worker_count,
            config.ring_depth,
            config.threading
        );

        let resources = upload_scene(&*device, &scene, config)?;
        let ring = FrameRing::new(&*device, config.ring_depth, config.worker_count, config.viewport)?;

        // flush setup work before the first frame
        let fence_value = 1;
        device.signal(fence_value)?;
        device.wait_for_value(fence_value)?;

        let shared = Arc::new(RecordingContext::new(
            ring,
            scene.draws,
            resources,
            config.worker_count,
        ));
        let pool = WorkerPool::spawn(Arc::clone(&shared), config.threading)?;

        Ok(Self {
            device,
            config: config.clone(),
            shared,
            pool,
            next_slot: 0,
            fence_value,
            frame_number: 0,
            stats: FrameStats::new(config.stats_interval),
            failed: false,
            shut_down: false,
        })
    }

    /// Renderer configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Frame ring
    pub fn ring(&self) -> &FrameRing {
        self.shared.ring()
    }

    /// Depth buffer of the scene pass
    pub fn scene_depth(&self) -> ResourceId {
        self.shared.resources().scene_depth
    }

    /// Last fence value signaled
    pub const fn fence_value(&self) -> u64 {
        self.fence_value
    }

    /// Number of frames rendered so far
    pub const fn frame_count(&self) -> u64 {
        self.frame_number
    }

    /// Record, submit and present one frame
    ///
    /// An error leaves host-side state tracking out of step with the device,
    /// so every later call fails as well; the renderer can only be shut down.
    pub fn render_frame(&mut self, camera: &Camera, lights: &LightRig) -> RenderResult<FrameReport> {
        if self.shut_down {
            return Err(RenderError::Submission("renderer has been shut down".to_string()));
        }
        if self.failed {
            return Err(RenderError::Submission(
                "renderer stopped after a failed frame".to_string(),
            ));
        }

        let result = self.record_and_submit(camera, lights);
        if let Err(error) = &result {
            log::error!("frame {} failed: {error}", self.frame_number);
            self.failed = true;
        }
        result
    }

    /// Whether a frame has failed and rendering stopped
    pub const fn has_failed(&self) -> bool {
        self.failed
    }

    fn record_and_submit(&mut self, camera: &Camera, lights: &LightRig) -> RenderResult<FrameReport> {
        let started = Instant::now();
        let slot_index = self.next_slot;
        let shared = Arc::clone(&self.shared);
        let ring = shared.ring();

        let retire_wait = ring.wait_until_retired(slot_index, &*self.device)?;
        let completed_at_reset = self.device.completed_value();
        let slot = ring.acquire(slot_index);

        slot.reset_for_recording();
        slot.write_constant_buffers(&*self.device, camera, lights, &self.config)?;

        let back_buffer_index = self.device.current_back_buffer_index();
        let render_target = self.device.back_buffer(back_buffer_index)?;
        log::debug!(
            "frame {}: slot {slot_index}, back buffer {back_buffer_index}",
            self.frame_number
        );

        self.record_pre(slot, render_target)?;

        self.pool.begin_frame(FrameTicket {
            slot_index,
            render_target,
        });
        self.pool.wait_shadow_done()?;
        if let Some(error) = self.pool.take_failure() {
            // let every worker finish the frame before reporting
            self.pool.wait_frame_done()?;
            if let Some(later) = self.pool.take_failure() {
                log::debug!("dropping follow-up failure: {later}");
            }
            return Err(error);
        }

        self.record_mid(slot)?;
        self.device.execute(&slot.shadow_batch()?)?;
        log::debug!("frame {}: shadow batch submitted", self.frame_number);

        self.pool.wait_frame_done()?;
        if let Some(error) = self.pool.take_failure() {
            return Err(error);
        }

        self.record_post(slot, render_target)?;
        self.device.execute(&slot.scene_batch()?)?;
        log::debug!("frame {}: scene batch submitted", self.frame_number);

        self.device.present()?;
        self.fence_value += 1;
        self.device.signal(self.fence_value)?;
        ring.mark_retire_fence(slot_index, self.fence_value);
        self.next_slot = (slot_index + 1) % ring.depth();

        let report = FrameReport {
            frame_number: self.frame_number,
            slot_index,
            retire_wait,
            completed_at_reset,
            fence_value: self.fence_value,
            cpu_time: started.elapsed(),
        };
        self.frame_number += 1;

        if let Some(window) = self.stats.record(report.cpu_time) {
            log::info!(
                "{:.1} fps, {:.3} ms host time per frame ({} workers)",
                window.frames_per_second,
                window.average_cpu_ms,
                self.config.worker_count
            );
        }

        Ok(report)
    }

    fn record_pre(&self, slot: &FrameResourceSlot, render_target: ResourceId) -> RenderResult<()> {
        let mut pre = slot.frame_list(FrameList::Pre);
        pre.record(Command::BeginEvent("pre"))?;
        pre.transition(render_target, ResourceState::Present, ResourceState::RenderTarget)?;
        pre.record(Command::ClearRenderTarget {
            target: render_target,
            color: CLEAR_COLOR,
        })?;
        pre.record(Command::ClearDepth {
            target: self.scene_depth(),
            depth: CLEAR_DEPTH,
        })?;
        pre.record(Command::ClearDepth {
            target: slot.shadow_map(),
            depth: CLEAR_DEPTH,
        })?;
        pre.record(Command::EndEvent)?;
        pre.close()
    }

    fn record_mid(&self, slot: &FrameResourceSlot) -> RenderResult<()> {
        slot.frame_list(FrameList::Mid).record(Command::BeginEvent("mid"))?;
        slot.record_shadow_to_readable_barrier()?;
        let mut mid = slot.frame_list(FrameList::Mid);
        mid.record(Command::EndEvent)?;
        mid.close()
    }

    fn record_post(&self, slot: &FrameResourceSlot, render_target: ResourceId) -> RenderResult<()> {
        slot.frame_list(FrameList::Post).record(Command::BeginEvent("post"))?;
        slot.record_readable_to_shadow_barrier()?;
        let mut post = slot.frame_list(FrameList::Post);
        post.transition(render_target, ResourceState::RenderTarget, ResourceState::Present)?;
        post.record(Command::EndEvent)?;
        post.close()
    }

    /// Wait for the device to go idle, then stop and join the workers
    ///
    /// Calling it again does nothing. Dropping the renderer calls it.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.fence_value += 1;
        let idle = self
            .device
            .signal(self.fence_value)
            .and_then(|()| self.device.wait_for_value(self.fence_value));
        let joined = self.pool.shutdown();

        log::info!("frame renderer shut down after {} frames", self.frame_number);
        idle.and(joined)
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            log::error!("frame renderer shutdown failed: {error}");
        }
    }
}

fn upload_scene(
    device: &dyn Device,
    scene: &SceneDescription,
    config: &RendererConfig,
) -> RenderResult<PassResources> {
    let vertex_buffer = device.create_buffer("scene/vertices", &scene.vertex_data)?;
    let index_buffer = device.create_buffer("scene/indices", &scene.index_data)?;
    let diffuse_textures = scene
        .textures
        .iter()
        .enumerate()
        .map(|(index, texture)| {
            device.create_texture(&TextureDesc::sampled(
                &format!("scene/diffuse[{index}]"),
                texture.width,
                texture.height,
                &texture.pixels,
            ))
        })
        .collect::<RenderResult<Vec<_>>>()?;
    let scene_depth = device.create_texture(&TextureDesc::depth(
        "scene/depth",
        config.viewport.width,
        config.viewport.height,
    ))?;

    log::debug!(
        "uploaded {} vertex bytes, {} index bytes, {} textures",
        scene.vertex_data.len(),
        scene.index_data.len(),
        diffuse_textures.len()
    );

    Ok(PassResources {
        viewport: config.viewport,
        vertex_buffer,
        vertex_stride: scene.vertex_stride,
        index_buffer,
        diffuse_textures,
        scene_depth,
    })
}
