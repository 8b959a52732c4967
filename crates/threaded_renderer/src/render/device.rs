//! Device abstraction
//!
//! The frame pipeline talks to the GPU through [`Device`]: resource creation,
//! ordered batch submission on a single queue, a monotonically increasing
//! fence, and presentation. Only the orchestrating thread submits; worker
//! threads never touch the device.

use std::fmt;

use crate::render::commands::{RecordedCommands, ResourceState};
use crate::render::error::RenderResult;

/// Opaque handle to a device resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Wrap a backend-specific resource index
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Backend-specific resource index
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Resource index as a table offset
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Texel format of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 32-bit float depth
    Depth32Float,
    /// 8-bit RGBA color
    Rgba8Unorm,
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    /// Debug label
    pub label: &'a str,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// State the texture is created in
    pub initial_state: ResourceState,
    /// Initial RGBA8 contents for color textures
    pub initial_data: Option<&'a [u32]>,
}

impl<'a> TextureDesc<'a> {
    /// Depth target created writable
    pub const fn depth(label: &'a str, width: u32, height: u32) -> Self {
        Self {
            label,
            width,
            height,
            format: TextureFormat::Depth32Float,
            initial_state: ResourceState::DepthWritable,
            initial_data: None,
        }
    }

    /// Shader-readable color texture with initial contents
    pub const fn sampled(label: &'a str, width: u32, height: u32, pixels: &'a [u32]) -> Self {
        Self {
            label,
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            initial_state: ResourceState::ShaderReadable,
            initial_data: Some(pixels),
        }
    }
}

/// GPU device with a single ordered submission queue
pub trait Device: Send + Sync {
    /// Create an immutable buffer initialized with `bytes`
    fn create_buffer(&self, label: &str, bytes: &[u8]) -> RenderResult<ResourceId>;

    /// Create a persistently mapped, host-writable buffer of `size` bytes
    fn create_upload_buffer(&self, label: &str, size: usize) -> RenderResult<ResourceId>;

    /// Copy `bytes` to the start of an upload buffer
    fn write_upload_buffer(&self, id: ResourceId, bytes: &[u8]) -> RenderResult<()>;

    /// Create a texture
    fn create_texture(&self, desc: &TextureDesc<'_>) -> RenderResult<ResourceId>;

    /// Number of swap-chain back buffers
    fn back_buffer_count(&self) -> usize;

    /// Back buffer at `index`
    fn back_buffer(&self, index: usize) -> RenderResult<ResourceId>;

    /// Back buffer the next frame renders into
    fn current_back_buffer_index(&self) -> usize;

    /// Queue command lists for execution, in order
    fn execute(&self, batch: &[RecordedCommands]) -> RenderResult<()>;

    /// Queue a fence signal; the fence reaches `value` once prior work completes
    fn signal(&self, value: u64) -> RenderResult<()>;

    /// Highest fence value the device has reached
    fn completed_value(&self) -> u64;

    /// Block until the fence reaches `value`
    fn wait_for_value(&self, value: u64) -> RenderResult<()>;

    /// Queue presentation of the current back buffer and advance to the next
    fn present(&self) -> RenderResult<()>;
}
