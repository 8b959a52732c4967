//! Shadow demo
//!
//! Renders the synthetic scene through the threaded frame pipeline on the
//! headless device. Pass a `.toml` or `.ron` configuration file as the first
//! argument to override the defaults.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use threaded_renderer::foundation::logging;
use threaded_renderer::foundation::time::Timer;
use threaded_renderer::prelude::*;

/// Demo state
struct ShadowDemo {
    config: AppConfig,
    device: Arc<HeadlessDevice>,
    renderer: FrameRenderer,
    camera: Camera,
    lights: LightRig,
    timer: Timer,
}

impl ShadowDemo {
    fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let latency = Duration::from_millis(config.scene.device_latency_ms);
        let device = Arc::new(HeadlessDevice::new(
            HeadlessConfig::from_renderer(&config.renderer).with_execute_latency(latency),
        )?);
        let scene = SceneDescription::synthetic(config.scene.draw_count, config.scene.texture_count);
        let renderer = FrameRenderer::new(Arc::clone(&device), scene, &config.renderer)?;
        let lights = LightRig::new(config.renderer.viewport);

        Ok(Self {
            config,
            device,
            renderer,
            camera: Camera::new(),
            lights,
            timer: Timer::new(),
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut stalled = 0_u64;

        for _ in 0..self.config.scene.frame_count {
            self.timer.update();
            if self.config.scene.animate_lights {
                self.lights
                    .animate(self.timer.delta_time(), self.config.renderer.viewport);
            }

            let report = self.renderer.render_frame(&self.camera, &self.lights)?;
            if report.retire_wait.blocked {
                stalled += 1;
            }
        }

        self.renderer.shutdown()?;
        log::info!(
            "rendered {} frames in {:.2}s, {} presented, host waited on the device {} times",
            self.renderer.frame_count(),
            self.timer.total_time(),
            self.device.presented_frames(),
            stalled
        );

        let errors = self.device.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            for error in &errors {
                log::warn!("{error}");
            }
            Err(format!("device reported {} validation errors", errors.len()).into())
        }
    }
}

fn load_config() -> Result<AppConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_file(path),
        None => Ok(AppConfig::default()),
    }
}

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(error) => {
            logging::init("info");
            log::error!("failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.engine.log_level);

    log::info!("starting shadow demo");
    let result = ShadowDemo::new(config).and_then(|mut demo| demo.run());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("shadow demo failed: {error}");
            ExitCode::FAILURE
        }
    }
}
