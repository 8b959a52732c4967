//! # Renderer Configuration
//!
//! Configuration for the frame pipeline: how many worker contexts record
//! commands, how many frames may be in flight, whether recording runs on a
//! dedicated worker pool or inline on the orchestrating thread, and the
//! viewport/projection constants used when building per-frame constants.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Upper bound on the frame ring depth
pub const MAX_RING_DEPTH: usize = 8;

/// How worker contexts are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// One long-lived thread per worker context
    Threaded,
    /// Every worker context runs sequentially on the orchestrating thread
    Inline,
}

impl Default for ThreadingMode {
    fn default() -> Self {
        Self::Threaded
    }
}

/// Output viewport dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a new viewport
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Number of texels covered by the viewport
    pub const fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// # Frame Pipeline Configuration
///
/// Number of recording contexts, number of frame resources, and the
/// constants baked into each frame's constant buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Number of worker contexts (draw-list partitions)
    pub worker_count: usize,
    /// Number of frame resource slots in the ring (frames in flight)
    pub ring_depth: usize,
    /// Dedicated worker threads or inline recording
    pub threading: ThreadingMode,
    /// Render target and shadow map dimensions
    pub viewport: Viewport,
    /// Vertical field of view in degrees for camera and light projections
    pub field_of_view_degrees: f32,
    /// Uniform scale applied to the scene model matrix
    pub model_scale: f32,
    /// Ambient color written to both constant buffers
    pub ambient_color: [f32; 4],
    /// Number of frames between statistics log lines
    pub stats_interval: u32,
}

impl RendererConfig {
    /// Create a new renderer configuration with defaults
    pub fn new() -> Self {
        Self {
            worker_count: 3,
            ring_depth: 3,
            threading: ThreadingMode::Threaded,
            viewport: Viewport::default(),
            field_of_view_degrees: 90.0,
            model_scale: 0.1,
            ambient_color: [0.1, 0.2, 0.3, 1.0],
            stats_interval: 200,
        }
    }

    /// Set the number of worker contexts
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the ring depth (frames in flight)
    pub fn with_ring_depth(mut self, depth: usize) -> Self {
        self.ring_depth = depth;
        self
    }

    /// Set the threading mode
    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    /// Set the viewport dimensions
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Set the statistics logging interval
    pub fn with_stats_interval(mut self, frames: u32) -> Self {
        self.stats_interval = frames;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("Worker count must be at least 1".to_string()));
        }

        if self.ring_depth == 0 {
            return Err(ConfigError::Invalid("Ring depth must be at least 1".to_string()));
        }

        if self.ring_depth > MAX_RING_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "Ring depth should not exceed {MAX_RING_DEPTH}"
            )));
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }

        if !(self.field_of_view_degrees > 0.0 && self.field_of_view_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "Field of view must be in (0, 180) degrees, got {}",
                self.field_of_view_degrees
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_shape() {
        let config = RendererConfig::default();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.ring_depth, 3);
        assert_eq!(config.threading, ThreadingMode::Threaded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(RendererConfig::default().with_worker_count(0).validate().is_err());
        assert!(RendererConfig::default().with_ring_depth(0).validate().is_err());
        assert!(RendererConfig::default()
            .with_ring_depth(MAX_RING_DEPTH + 1)
            .validate()
            .is_err());
        assert!(RendererConfig::default().with_viewport(0, 10).validate().is_err());
    }

    #[test]
    fn test_viewport_aspect() {
        let viewport = Viewport::new(200, 100);
        assert!((viewport.aspect_ratio() - 2.0).abs() < f32::EPSILON);
        assert_eq!(viewport.texel_count(), 20_000);
    }
}
