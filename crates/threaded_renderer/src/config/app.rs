//! # Application Configuration
//!
//! Top-level configuration used by applications driving the frame pipeline.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError, RendererConfig};

/// # Engine Configuration
///
/// Core behavior that is not specific to the frame pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log filter in `env_logger` syntax (e.g. "info", "threaded_renderer=debug")
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Scene Configuration
///
/// Parameters for the synthetic scene and the run loop of the demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Number of draw calls in the flat draw list
    pub draw_count: usize,
    /// Number of diffuse textures referenced by draw calls
    pub texture_count: usize,
    /// Number of frames to render before shutting down
    pub frame_count: u64,
    /// Whether the light rig animates between frames
    pub animate_lights: bool,
    /// Artificial per-batch latency of the headless device, in milliseconds
    pub device_latency_ms: u64,
}

impl SceneConfig {
    /// Create a new scene configuration
    pub fn new() -> Self {
        Self {
            draw_count: 96,
            texture_count: 8,
            frame_count: 600,
            animate_lights: true,
            device_latency_ms: 0,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Frame pipeline configuration
    pub renderer: RendererConfig,
    /// Scene and run-loop configuration
    pub scene: SceneConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate()?;
        if self.scene.texture_count == 0 && self.scene.draw_count > 0 {
            return Err(ConfigError::Invalid(
                "Draw calls need at least one diffuse texture".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            renderer: RendererConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl Config for AppConfig {}
