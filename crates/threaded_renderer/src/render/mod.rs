//! # Rendering
//!
//! Multithreaded frame pipeline for a shadowed scene.
//!
//! ## Architecture
//!
//! - **Device**: Resource creation, ordered submission and a fence
//! - **Commands**: Host-recorded command lists frozen on close
//! - **Frame Ring**: Per-frame slots reused once their fence retires
//! - **Workers**: Stride partitions of the draw list recorded in parallel
//! - **Renderer**: The orchestrator tying the above together each frame

/// Device backend implementations
pub mod backends;
pub mod camera;
pub mod commands;
pub mod constants;
pub mod device;
pub mod error;
pub mod frame;
pub mod lighting;
pub mod partition;
pub mod renderer;
pub mod scene;
pub mod sync;
pub mod workers;

mod renderer_tests;

pub use camera::Camera;
pub use commands::{CommandBuffer, PipelineKind, RecordedCommands, ResourceState};
pub use device::{Device, ResourceId, TextureDesc, TextureFormat};
pub use error::{RenderError, RenderResult};
pub use frame::{FrameRing, RetireWait};
pub use lighting::{LightRig, LightState};
pub use renderer::{FrameRenderer, FrameReport};
pub use scene::{DrawCall, SceneDescription, TextureData};
