//! # Threaded Renderer
//!
//! Frame-pipelined rendering of a shadowed 3D scene with command recording
//! split across a fixed pool of worker threads.
//!
//! ## Features
//!
//! - **Frame Ring**: A small ring of per-frame resource bundles, each guarded by
//!   the device fence value of its last submission
//! - **Worker Pool**: Long-lived threads that record a shadow pass and a scene
//!   pass for a stride partition of the draw list
//! - **Two-Phase Submission**: All shadow-pass work is queued before any
//!   scene-pass work that samples the shadow map
//! - **Headless Device**: A reference device that executes recorded commands on
//!   its own queue thread and validates resource-state transitions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threaded_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let device = Arc::new(HeadlessDevice::new(HeadlessConfig::from_renderer(&config))?);
//!     let scene = SceneDescription::synthetic(48, 4);
//!
//!     let mut renderer = FrameRenderer::new(device, scene, &config)?;
//!     let camera = Camera::new();
//!     let mut lights = LightRig::new(config.viewport);
//!
//!     for _ in 0..10 {
//!         lights.animate(1.0 / 60.0, config.viewport);
//!         renderer.render_frame(&camera, &lights)?;
//!     }
//!     renderer.shutdown()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{AppConfig, Config, ConfigError, RendererConfig, ThreadingMode, Viewport},
        foundation::math::{Mat4, Vec3, Vec4},
        render::{
            backends::headless::{HeadlessConfig, HeadlessDevice},
            Camera, Device, DrawCall, FrameRenderer, FrameReport, LightRig, RenderError,
            RenderResult, SceneDescription,
        },
    };
}
