//! Command-list execution against the resource table
//!
//! Rasterization is replaced by a deterministic, order-independent footprint
//! model: every draw covers a run of texels derived from a hash of the draw
//! and the bound view/projection, with a hashed depth. Depth testing keeps the
//! lexicographic minimum of `(depth, color)`, so the final image does not
//! depend on which worker recorded which draw or in what order command lists
//! from the same batch ran.

use crate::config::Viewport;
use crate::foundation::math::RawMat4;
use crate::render::commands::{
    Command, PipelineKind, RecordedCommands, ResourceState, RootSlot, Transition, ViewBinding,
};
use crate::render::constants::SceneConstants;
use crate::render::device::ResourceId;

const ROOT_SLOT_COUNT: usize = 4;
const DEPTH_SALT: u64 = 0xD1B5_4A32_D192_ED03;
const COLOR_SALT: u64 = 0x8CB9_2BA7_2F3D_8DD7;
const SHADOWED_BIT: u32 = 1 << 23;

/// Texel storage of a resource
#[derive(Debug)]
pub(super) enum ResourceData {
    Buffer(Vec<u8>),
    Depth(Vec<f32>),
    Color(Vec<u32>),
}

#[derive(Debug)]
pub(super) struct Resource {
    pub label: String,
    pub data: ResourceData,
    pub state: ResourceState,
    pub transitions: Vec<(ResourceState, ResourceState)>,
}

/// Every resource the device owns plus the validation messages gathered so far
#[derive(Debug, Default)]
pub(super) struct ResourceTable {
    resources: Vec<Resource>,
    validation_errors: Vec<String>,
}

impl ResourceTable {
    pub fn insert(&mut self, label: &str, data: ResourceData, state: ResourceState) -> ResourceId {
        let id = ResourceId::from_raw(u32::try_from(self.resources.len()).unwrap_or(u32::MAX));
        self.resources.push(Resource {
            label: label.to_string(),
            data,
            state,
            transitions: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(id.index())
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    pub fn report(&mut self, message: String) {
        log::warn!("validation: {message}");
        self.validation_errors.push(message);
    }

    /// Run one command list; returns the number of draws that were rasterized
    pub fn execute(&mut self, list: &RecordedCommands) -> usize {
        let mut executor = Executor::new(self, list.label());
        for command in list.commands() {
            executor.apply(command);
        }
        let (open_events, draws) = (executor.open_events, executor.draws);

        if open_events != 0 {
            self.report(format!("{}: {open_events} debug event(s) left open", list.label()));
        }
        draws
    }

    /// Validate and apply a present of `back_buffer`; returns its texels
    pub fn present(&mut self, back_buffer: ResourceId) -> Option<Vec<u32>> {
        let Some(resource) = self.get(back_buffer) else {
            self.report(format!("present: unknown back buffer {back_buffer}"));
            return None;
        };

        if resource.state != ResourceState::Present {
            let message = format!(
                "present: back buffer '{}' is {:?}, expected Present",
                resource.label, resource.state
            );
            self.report(message);
        }

        match &self.get(back_buffer)?.data {
            ResourceData::Color(texels) => Some(texels.clone()),
            _ => None,
        }
    }

    fn texture_state(&self, id: ResourceId) -> Option<ResourceState> {
        self.get(id).map(|resource| resource.state)
    }

    fn constants(&self, id: ResourceId) -> Option<SceneConstants> {
        match &self.get(id)?.data {
            ResourceData::Buffer(bytes) => SceneConstants::read_from(bytes),
            _ => None,
        }
    }
}

/// Pipeline state of one command list; every list starts from scratch
struct Executor<'t> {
    table: &'t mut ResourceTable,
    label: &'t str,
    pipeline: Option<PipelineKind>,
    viewport: Option<Viewport>,
    vertex_buffer: Option<ResourceId>,
    index_buffer: Option<ResourceId>,
    tables: [Option<ViewBinding>; ROOT_SLOT_COUNT],
    color_target: Option<ResourceId>,
    depth_target: Option<ResourceId>,
    open_events: usize,
    draws: usize,
}

impl<'t> Executor<'t> {
    fn new(table: &'t mut ResourceTable, label: &'t str) -> Self {
        Self {
            table,
            label,
            pipeline: None,
            viewport: None,
            vertex_buffer: None,
            index_buffer: None,
            tables: [None; ROOT_SLOT_COUNT],
            color_target: None,
            depth_target: None,
            open_events: 0,
            draws: 0,
        }
    }

    fn fail(&mut self, message: impl std::fmt::Display) {
        let message = format!("{}: {message}", self.label);
        self.table.report(message);
    }

    fn require_state(&mut self, id: ResourceId, expected: ResourceState, usage: &str) -> bool {
        match self.table.texture_state(id) {
            Some(state) if state == expected => true,
            Some(state) => {
                let label = self.table.get(id).map_or_else(String::new, |r| r.label.clone());
                self.fail(format!("{usage} '{label}' is {state:?}, expected {expected:?}"));
                false
            }
            None => {
                self.fail(format!("{usage} {id} does not exist"));
                false
            }
        }
    }

    fn binding(&self, slot: RootSlot) -> Option<ViewBinding> {
        self.tables[slot_index(slot)]
    }

    fn apply(&mut self, command: &Command) {
        match *command {
            Command::SetPipeline(kind) => self.pipeline = Some(kind),
            Command::SetViewport(viewport) => self.viewport = Some(viewport),
            Command::SetVertexBuffer { buffer, .. } => self.vertex_buffer = Some(buffer),
            Command::SetIndexBuffer(buffer) => self.index_buffer = Some(buffer),
            Command::BindTable { slot, view } => self.tables[slot_index(slot)] = Some(view),
            Command::SetRenderTargets { color, depth } => {
                self.color_target = color;
                self.depth_target = Some(depth);
            }
            Command::ClearRenderTarget { target, color } => self.clear_color(target, color),
            Command::ClearDepth { target, depth } => self.clear_depth(target, depth),
            Command::DrawIndexed {
                index_count,
                start_index,
                base_vertex,
            } => {
                let key = draw_key(index_count, start_index, base_vertex);
                match self.pipeline {
                    Some(PipelineKind::Shadow) => self.draw_shadow(key, index_count),
                    Some(PipelineKind::Scene) => self.draw_scene(key, index_count),
                    None => self.fail("draw without a pipeline"),
                }
            }
            Command::Barrier(transition) => self.barrier(transition),
            Command::BeginEvent(name) => {
                log::trace!("{}: begin '{name}'", self.label);
                self.open_events += 1;
            }
            Command::EndEvent => {
                if self.open_events == 0 {
                    self.fail("end event without a matching begin");
                } else {
                    self.open_events -= 1;
                }
            }
        }
    }

    fn barrier(&mut self, transition: Transition) {
        let Some(resource) = self.table.get_mut(transition.resource) else {
            self.fail(format!("barrier on unknown resource {}", transition.resource));
            return;
        };

        let actual = resource.state;
        resource.state = transition.after;
        resource.transitions.push((transition.before, transition.after));
        log::trace!(
            "{}: '{}' {:?} -> {:?}",
            self.label,
            resource.label,
            transition.before,
            transition.after
        );

        if actual != transition.before {
            let label = resource.label.clone();
            self.fail(format!(
                "barrier on '{label}' expects {:?} but resource is {actual:?}",
                transition.before
            ));
        }
    }

    fn clear_color(&mut self, target: ResourceId, color: [f32; 4]) {
        if !self.require_state(target, ResourceState::RenderTarget, "cleared color target") {
            return;
        }
        if let Some(ResourceData::Color(texels)) = self.table.get_mut(target).map(|r| &mut r.data) {
            texels.fill(pack_rgba8(color));
        }
    }

    fn clear_depth(&mut self, target: ResourceId, depth: f32) {
        if !self.require_state(target, ResourceState::DepthWritable, "cleared depth target") {
            return;
        }
        if let Some(ResourceData::Depth(texels)) = self.table.get_mut(target).map(|r| &mut r.data) {
            texels.fill(depth);
        }
    }

    fn pass_constants(&mut self) -> Option<SceneConstants> {
        let constants = match self.binding(RootSlot::Constants) {
            Some(ViewBinding::ConstantBuffer(id)) => self.table.constants(id),
            _ => None,
        };
        if constants.is_none() {
            self.fail("draw without a readable constant buffer");
        }
        constants
    }

    fn geometry_bound(&mut self) -> bool {
        let bound = self.vertex_buffer.is_some() && self.index_buffer.is_some() && self.viewport.is_some();
        if !bound {
            self.fail("draw without vertex/index buffers and viewport");
        }
        bound
    }

    fn draw_shadow(&mut self, draw: u64, index_count: u32) {
        if !self.geometry_bound() {
            return;
        }
        let Some(depth_target) = self.depth_target else {
            self.fail("shadow draw without a depth target");
            return;
        };
        if self.color_target.is_some() {
            self.fail("shadow draw with a color target bound");
        }
        if !self.require_state(depth_target, ResourceState::DepthWritable, "shadow depth target") {
            return;
        }
        let Some(constants) = self.pass_constants() else {
            return;
        };

        let key = view_key(&constants.view, &constants.projection);
        if let Some(ResourceData::Depth(texels)) = self.table.get_mut(depth_target).map(|r| &mut r.data) {
            let depth = footprint_depth(draw, key);
            for texel in footprint(draw, key, index_count, texels.len()) {
                if depth < texels[texel] {
                    texels[texel] = depth;
                }
            }
        }
        self.draws += 1;
    }

    fn draw_scene(&mut self, draw: u64, index_count: u32) {
        if !self.geometry_bound() {
            return;
        }
        let (Some(color_target), Some(depth_target)) = (self.color_target, self.depth_target) else {
            self.fail("scene draw without color and depth targets");
            return;
        };
        if !self.require_state(color_target, ResourceState::RenderTarget, "scene color target")
            || !self.require_state(depth_target, ResourceState::DepthWritable, "scene depth target")
        {
            return;
        }
        let Some(constants) = self.pass_constants() else {
            return;
        };
        let texture = match self.binding(RootSlot::DiffuseTexture) {
            Some(ViewBinding::Texture(id)) => id,
            _ => {
                self.fail("scene draw without a diffuse texture");
                return;
            }
        };

        let shadowed = constants.samples_shadow_map() && self.sample_shadow(draw, &constants);
        let key = view_key(&constants.view, &constants.projection);
        let depth = footprint_depth(draw, key);
        let shadow_bit = if shadowed { SHADOWED_BIT } else { 0 };
        #[allow(clippy::cast_possible_truncation)]
        let color =
            ((texture.raw() & 0xFF) << 24) | shadow_bit | (mix(draw ^ key ^ COLOR_SALT) as u32 & (SHADOWED_BIT - 1));

        let mut depth_texels = match self.table.get_mut(depth_target).map(|r| &mut r.data) {
            Some(ResourceData::Depth(texels)) => std::mem::take(texels),
            _ => return,
        };
        if let Some(ResourceData::Color(color_texels)) = self.table.get_mut(color_target).map(|r| &mut r.data) {
            let texel_count = depth_texels.len().min(color_texels.len());
            for texel in footprint(draw, key, index_count, texel_count) {
                let nearer = depth < depth_texels[texel]
                    || (depth == depth_texels[texel] && color < color_texels[texel]);
                if nearer {
                    depth_texels[texel] = depth;
                    color_texels[texel] = color;
                }
            }
        }
        if let Some(ResourceData::Depth(texels)) = self.table.get_mut(depth_target).map(|r| &mut r.data) {
            *texels = depth_texels;
        }
        self.draws += 1;
    }

    /// Whether the draw's light-space footprint is occluded in the shadow map
    fn sample_shadow(&mut self, draw: u64, constants: &SceneConstants) -> bool {
        let shadow_map = match self.binding(RootSlot::ShadowMap) {
            Some(ViewBinding::Texture(id)) => id,
            Some(ViewBinding::Null) => return false,
            _ => {
                self.fail("scene draw samples an unbound shadow map");
                return false;
            }
        };
        if !self.require_state(shadow_map, ResourceState::ShaderReadable, "sampled shadow map") {
            return false;
        }

        let light = &constants.lights[0];
        let key = view_key(&light.view, &light.projection);
        match self.table.get(shadow_map).map(|r| &r.data) {
            Some(ResourceData::Depth(texels)) if !texels.is_empty() => {
                let start = footprint_start(draw, key, texels.len());
                texels[start] < footprint_depth(draw, key)
            }
            _ => false,
        }
    }
}

const fn slot_index(slot: RootSlot) -> usize {
    match slot {
        RootSlot::DiffuseTexture => 0,
        RootSlot::Constants => 1,
        RootSlot::ShadowMap => 2,
        RootSlot::Samplers => 3,
    }
}

/// splitmix64 finalizer
const fn mix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[allow(clippy::cast_sign_loss)]
fn draw_key(index_count: u32, start_index: u32, base_vertex: i32) -> u64 {
    mix(u64::from(index_count) | (u64::from(start_index) << 32)) ^ mix(u64::from(base_vertex as u32))
}

fn view_key(view: &RawMat4, projection: &RawMat4) -> u64 {
    view.iter()
        .chain(projection.iter())
        .flatten()
        .fold(0_u64, |hash, value| mix(hash ^ u64::from(value.to_bits())))
}

#[allow(clippy::cast_possible_truncation)]
fn footprint_start(draw: u64, view: u64, texel_count: usize) -> usize {
    (mix(draw ^ view) % texel_count.max(1) as u64) as usize
}

#[allow(clippy::cast_precision_loss)]
fn footprint_depth(draw: u64, view: u64) -> f32 {
    // 24 bits keep every value exactly representable
    (mix(draw ^ view ^ DEPTH_SALT) >> 40) as f32 / (1_u32 << 24) as f32
}

fn footprint(draw: u64, view: u64, index_count: u32, texel_count: usize) -> impl Iterator<Item = usize> {
    let start = footprint_start(draw, view, texel_count);
    let triangles = usize::try_from(index_count / 3).unwrap_or(usize::MAX).max(1);
    let len = if texel_count == 0 { 0 } else { triangles.min(texel_count) };
    (0..len).map(move |offset| (start + offset) % texel_count)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pack_rgba8(color: [f32; 4]) -> u32 {
    color.iter().enumerate().fold(0, |packed, (channel, value)| {
        packed | ((value.clamp(0.0, 1.0) * 255.0).round() as u32) << (channel * 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_black_and_white() {
        assert_eq!(pack_rgba8([0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(pack_rgba8([1.0, 1.0, 1.0, 1.0]), u32::MAX);
        assert_eq!(pack_rgba8([1.0, 0.0, 0.0, 0.0]), 0xFF);
    }

    #[test]
    fn test_footprint_wraps_and_is_bounded() {
        let texels: Vec<usize> = footprint(7, 11, 30, 4).collect();
        assert_eq!(texels.len(), 4);
        assert!(texels.iter().all(|&t| t < 4));

        assert_eq!(footprint(7, 11, 3, 0).count(), 0);
    }

    #[test]
    fn test_depth_is_in_unit_range() {
        for draw in 0..100 {
            let depth = footprint_depth(mix(draw), 42);
            assert!((0.0..1.0).contains(&depth));
        }
    }
}
