//! Frame resource slot

use parking_lot::{Mutex, MutexGuard};

use crate::config::{RendererConfig, Viewport};
use crate::foundation::math::{utils, Mat4};
use crate::render::camera::Camera;
use crate::render::commands::{
    Command, CommandBuffer, PipelineKind, RecordedCommands, ResourceState, RootSlot, ViewBinding,
};
use crate::render::constants::SceneConstants;
use crate::render::device::{Device, ResourceId, TextureDesc};
use crate::render::error::RenderResult;
use crate::render::lighting::{LightRig, LIGHT_FOV_DEGREES};

/// Command lists recorded by the orchestrator around the worker passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameList {
    /// Back-buffer acquire and target clears, submitted ahead of the shadow passes
    Pre,
    /// Shadow map to shader-readable, submitted after the shadow passes
    Mid,
    /// Shadow map back to depth-writable and back buffer to present, submitted last
    Post,
}

impl FrameList {
    /// Every list in submission order
    pub const ALL: [Self; 3] = [Self::Pre, Self::Mid, Self::Post];

    /// Short name used in labels
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Mid => "mid",
            Self::Post => "post",
        }
    }

    const fn position(self) -> usize {
        match self {
            Self::Pre => 0,
            Self::Mid => 1,
            Self::Post => 2,
        }
    }
}

/// Everything one in-flight frame writes
///
/// Worker `i` only ever locks its own shadow and scene lists; the orchestrator
/// owns the [`FrameList`]s. The locks are therefore uncontended and exist to
/// make the sharing explicit.
pub struct FrameResourceSlot {
    index: usize,
    frame_lists: [Mutex<CommandBuffer>; 3],
    shadow_lists: Vec<Mutex<CommandBuffer>>,
    scene_lists: Vec<Mutex<CommandBuffer>>,
    shadow_map: ResourceId,
    shadow_map_state: Mutex<ResourceState>,
    scene_constants: ResourceId,
    shadow_constants: ResourceId,
}

impl FrameResourceSlot {
    /// Create the slot's shadow map, constant buffers and command lists
    ///
    /// Any device failure aborts creation of the whole slot.
    pub fn new(
        device: &dyn Device,
        index: usize,
        worker_count: usize,
        viewport: Viewport,
    ) -> RenderResult<Self> {
        let shadow_map = device.create_texture(&TextureDesc::depth(
            &format!("slot{index}/shadow_map"),
            viewport.width,
            viewport.height,
        ))?;
        let scene_constants =
            device.create_upload_buffer(&format!("slot{index}/scene_constants"), SceneConstants::buffer_size())?;
        let shadow_constants =
            device.create_upload_buffer(&format!("slot{index}/shadow_constants"), SceneConstants::buffer_size())?;

        let frame_lists = FrameList::ALL.map(|list| {
            Mutex::new(CommandBuffer::new(
                format!("slot{index}/{}", list.name()),
                PipelineKind::Scene,
            ))
        });
        let shadow_lists = (0..worker_count)
            .map(|worker| {
                Mutex::new(CommandBuffer::new(
                    format!("slot{index}/shadow[{worker}]"),
                    PipelineKind::Shadow,
                ))
            })
            .collect();
        let scene_lists = (0..worker_count)
            .map(|worker| {
                Mutex::new(CommandBuffer::new(
                    format!("slot{index}/scene[{worker}]"),
                    PipelineKind::Scene,
                ))
            })
            .collect();

        log::debug!("created frame slot {index} for {worker_count} workers");

        Ok(Self {
            index,
            frame_lists,
            shadow_lists,
            scene_lists,
            shadow_map,
            shadow_map_state: Mutex::new(ResourceState::DepthWritable),
            scene_constants,
            shadow_constants,
        })
    }

    /// Position in the ring
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of worker list pairs
    pub fn worker_count(&self) -> usize {
        self.shadow_lists.len()
    }

    /// Shadow map texture
    pub const fn shadow_map(&self) -> ResourceId {
        self.shadow_map
    }

    /// Shadow map state after every command recorded so far
    pub fn shadow_map_state(&self) -> ResourceState {
        *self.shadow_map_state.lock()
    }

    /// Scene and shadow constant buffers
    pub const fn constant_buffers(&self) -> (ResourceId, ResourceId) {
        (self.scene_constants, self.shadow_constants)
    }

    /// Orchestrator-owned list
    pub fn frame_list(&self, list: FrameList) -> MutexGuard<'_, CommandBuffer> {
        self.frame_lists[list.position()].lock()
    }

    /// Shadow list of `worker`
    pub fn shadow_list(&self, worker: usize) -> MutexGuard<'_, CommandBuffer> {
        self.shadow_lists[worker].lock()
    }

    /// Scene list of `worker`
    pub fn scene_list(&self, worker: usize) -> MutexGuard<'_, CommandBuffer> {
        self.scene_lists[worker].lock()
    }

    /// Recycle every command list of the slot
    ///
    /// The device must have retired the slot's previous submission.
    pub fn reset_for_recording(&self) {
        let lists = self
            .frame_lists
            .iter()
            .chain(&self.shadow_lists)
            .chain(&self.scene_lists);
        for list in lists {
            list.lock().reset();
        }
    }

    /// Fill both constant buffers for this frame
    pub fn write_constant_buffers(
        &self,
        device: &dyn Device,
        camera: &Camera,
        lights: &LightRig,
        config: &RendererConfig,
    ) -> RenderResult<()> {
        let (view, projection) = camera.view_projection(config.field_of_view_degrees, config.viewport);
        let scene = SceneConstants {
            model: utils::to_raw(&Mat4::new_scaling(config.model_scale)),
            view: utils::to_raw(&view),
            projection: utils::to_raw(&projection),
            ambient_color: config.ambient_color,
            sample_shadow_map: 1,
            padding: [0; 3],
            lights: lights.to_constants(),
        };

        let (shadow_view, shadow_projection) = lights
            .shadow_camera()
            .view_projection(LIGHT_FOV_DEGREES, config.viewport);
        let shadow = SceneConstants {
            view: utils::to_raw(&shadow_view),
            projection: utils::to_raw(&shadow_projection),
            sample_shadow_map: 0,
            ..scene
        };

        device.write_upload_buffer(self.scene_constants, bytemuck::bytes_of(&scene))?;
        device.write_upload_buffer(self.shadow_constants, bytemuck::bytes_of(&shadow))
    }

    /// Record the shadow map's transition to shader-readable into the mid list
    pub fn record_shadow_to_readable_barrier(&self) -> RenderResult<()> {
        self.record_shadow_barrier(FrameList::Mid, ResourceState::DepthWritable, ResourceState::ShaderReadable)
    }

    /// Record the shadow map's transition back to depth-writable into the post list
    pub fn record_readable_to_shadow_barrier(&self) -> RenderResult<()> {
        self.record_shadow_barrier(FrameList::Post, ResourceState::ShaderReadable, ResourceState::DepthWritable)
    }

    fn record_shadow_barrier(
        &self,
        list: FrameList,
        before: ResourceState,
        after: ResourceState,
    ) -> RenderResult<()> {
        let mut state = self.shadow_map_state.lock();
        debug_assert_eq!(*state, before, "slot {} shadow map out of sequence", self.index);

        self.frame_list(list).transition(self.shadow_map, before, after)?;
        *state = after;
        Ok(())
    }

    /// Bind the slot for a shadow pass: depth-only output into the shadow map
    pub fn bind_shadow_pass(&self, commands: &mut CommandBuffer) -> RenderResult<()> {
        commands.bind_table(RootSlot::ShadowMap, ViewBinding::Null)?;
        commands.bind_table(RootSlot::Constants, ViewBinding::ConstantBuffer(self.shadow_constants))?;
        commands.record(Command::SetRenderTargets {
            color: None,
            depth: self.shadow_map,
        })
    }

    /// Bind the slot for a scene pass that samples the shadow map
    pub fn bind_scene_pass(
        &self,
        commands: &mut CommandBuffer,
        render_target: ResourceId,
        depth_target: ResourceId,
    ) -> RenderResult<()> {
        commands.bind_table(RootSlot::ShadowMap, ViewBinding::Texture(self.shadow_map))?;
        commands.bind_table(RootSlot::Constants, ViewBinding::ConstantBuffer(self.scene_constants))?;
        commands.record(Command::SetRenderTargets {
            color: Some(render_target),
            depth: depth_target,
        })
    }

    /// First batch: pre list, every shadow list, mid list
    pub fn shadow_batch(&self) -> RenderResult<Vec<RecordedCommands>> {
        let mut batch = Vec::with_capacity(self.worker_count() + 2);
        batch.push(self.frame_list(FrameList::Pre).recorded()?);
        for list in &self.shadow_lists {
            batch.push(list.lock().recorded()?);
        }
        batch.push(self.frame_list(FrameList::Mid).recorded()?);
        Ok(batch)
    }

    /// Second batch: every scene list, post list
    pub fn scene_batch(&self) -> RenderResult<Vec<RecordedCommands>> {
        let mut batch = Vec::with_capacity(self.worker_count() + 1);
        for list in &self.scene_lists {
            batch.push(list.lock().recorded()?);
        }
        batch.push(self.frame_list(FrameList::Post).recorded()?);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessConfig, HeadlessDevice};
    use crate::render::error::RenderError;
    use approx::assert_relative_eq;

    fn slot(device: &HeadlessDevice) -> FrameResourceSlot {
        FrameResourceSlot::new(device, 1, 2, Viewport::new(4, 4)).unwrap()
    }

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(HeadlessConfig {
            back_buffer_count: 2,
            width: 4,
            height: 4,
            execute_latency: std::time::Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn test_lists_are_labelled_per_slot() {
        let device = device();
        let slot = slot(&device);
        assert_eq!(slot.frame_list(FrameList::Mid).label(), "slot1/mid");
        assert_eq!(slot.shadow_list(1).label(), "slot1/shadow[1]");
        assert_eq!(slot.scene_list(0).label(), "slot1/scene[0]");
        assert_eq!(slot.scene_list(0).pipeline(), PipelineKind::Scene);
        assert_eq!(slot.shadow_list(0).pipeline(), PipelineKind::Shadow);
    }

    #[test]
    fn test_batches_need_closed_lists() {
        let device = device();
        let slot = slot(&device);
        slot.reset_for_recording();
        assert!(matches!(
            slot.shadow_batch(),
            Err(RenderError::CommandBufferNotClosed { .. })
        ));

        for list in FrameList::ALL {
            slot.frame_list(list).close().unwrap();
        }
        for worker in 0..2 {
            slot.shadow_list(worker).close().unwrap();
            slot.scene_list(worker).close().unwrap();
        }

        let labels: Vec<String> = slot
            .shadow_batch()
            .unwrap()
            .iter()
            .map(|list| list.label().to_string())
            .collect();
        assert_eq!(labels, ["slot1/pre", "slot1/shadow[0]", "slot1/shadow[1]", "slot1/mid"]);
        assert_eq!(slot.scene_batch().unwrap().len(), 3);
    }

    #[test]
    fn test_shadow_barriers_alternate_state() {
        let device = device();
        let slot = slot(&device);
        slot.reset_for_recording();

        assert_eq!(slot.shadow_map_state(), ResourceState::DepthWritable);
        slot.record_shadow_to_readable_barrier().unwrap();
        assert_eq!(slot.shadow_map_state(), ResourceState::ShaderReadable);
        slot.record_readable_to_shadow_barrier().unwrap();
        assert_eq!(slot.shadow_map_state(), ResourceState::DepthWritable);

        assert!(slot
            .frame_list(FrameList::Mid)
            .commands()
            .contains(&Command::Barrier(crate::render::commands::Transition {
                resource: slot.shadow_map(),
                before: ResourceState::DepthWritable,
                after: ResourceState::ShaderReadable,
            })));
    }

    #[test]
    fn test_constant_buffers_carry_pass_cameras() {
        let device = device();
        let slot = slot(&device);
        let config = RendererConfig::default().with_viewport(4, 4);
        let lights = LightRig::new(config.viewport);

        slot.write_constant_buffers(&device, &Camera::new(), &lights, &config)
            .unwrap();

        let (scene_id, shadow_id) = slot.constant_buffers();
        let scene = SceneConstants::read_from(&device.buffer_contents(scene_id).unwrap()).unwrap();
        let shadow = SceneConstants::read_from(&device.buffer_contents(shadow_id).unwrap()).unwrap();

        assert!(scene.samples_shadow_map());
        assert!(!shadow.samples_shadow_map());
        let (light_view, _) = lights
            .shadow_camera()
            .view_projection(LIGHT_FOV_DEGREES, config.viewport);
        assert_eq!(shadow.view, utils::to_raw(&light_view));
        assert_eq!(shadow.view, scene.lights[0].view);
        assert_eq!(shadow.projection, scene.lights[0].projection);
        assert_eq!(shadow.model, scene.model);
        assert_relative_eq!(scene.model[0][0], 0.1);
        assert_relative_eq!(scene.model[3][3], 1.0);
        assert_eq!(scene.ambient_color, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_creation_failure_aborts_slot() {
        let device = device();
        device.fail_resource_creation_after(2);
        assert!(FrameResourceSlot::new(&device, 0, 1, Viewport::new(4, 4)).is_err());
    }
}
