//! Frame pipeline scenarios against the headless device

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{RendererConfig, ThreadingMode};
    use crate::render::backends::headless::{HeadlessConfig, HeadlessDevice, QueueEvent};
    use crate::render::commands::{Command, ResourceState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const FRAME_TIME: f32 = 1.0 / 60.0;

    fn config(worker_count: usize, ring_depth: usize, threading: ThreadingMode) -> RendererConfig {
        RendererConfig::default()
            .with_worker_count(worker_count)
            .with_ring_depth(ring_depth)
            .with_threading(threading)
            .with_viewport(32, 32)
            .with_stats_interval(1_000)
    }

    fn device(config: &RendererConfig, latency: Duration) -> Arc<HeadlessDevice> {
        Arc::new(HeadlessDevice::new(HeadlessConfig::from_renderer(config).with_execute_latency(latency)).unwrap())
    }

    /// Render `frames` frames with the lights animating, then drain the device
    fn run(renderer: &mut FrameRenderer, frames: usize) -> Vec<FrameReport> {
        let camera = Camera::new();
        let viewport = renderer.config().viewport;
        let mut lights = LightRig::new(viewport);

        let reports = (0..frames)
            .map(|_| {
                lights.animate(FRAME_TIME, viewport);
                renderer.render_frame(&camera, &lights).unwrap()
            })
            .collect();
        renderer.shutdown().unwrap();
        reports
    }

    fn draw_starts(commands: &[Command]) -> Vec<u32> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawIndexed { start_index, .. } => Some(*start_index),
                _ => None,
            })
            .collect()
    }

    fn labels(slot: usize, pass: &str, worker_count: usize) -> impl Iterator<Item = String> + '_ {
        (0..worker_count).map(move |worker| format!("slot{slot}/{pass}[{worker}]"))
    }

    #[test]
    fn test_shadow_batch_precedes_scene_batch() {
        let config = config(3, 3, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        let scene = SceneDescription::synthetic(30, 4);
        let mut renderer = FrameRenderer::new(Arc::clone(&device), scene, &config).unwrap();
        run(&mut renderer, 5);

        let mut expected = vec![QueueEvent::Signal(1)];
        for frame in 0..5_u64 {
            let slot = (frame % 3) as usize;
            let shadow_batch = std::iter::once(format!("slot{slot}/pre"))
                .chain(labels(slot, "shadow", 3))
                .chain(std::iter::once(format!("slot{slot}/mid")))
                .collect();
            let scene_batch = labels(slot, "scene", 3)
                .chain(std::iter::once(format!("slot{slot}/post")))
                .collect();

            expected.push(QueueEvent::Execute {
                labels: shadow_batch,
                draw_count: 30,
            });
            expected.push(QueueEvent::Execute {
                labels: scene_batch,
                draw_count: 30,
            });
            expected.push(QueueEvent::Present { back_buffer: slot });
            expected.push(QueueEvent::Signal(frame + 2));
        }
        expected.push(QueueEvent::Signal(7));

        assert_eq!(device.queue_log(), expected);
        assert!(device.validation_errors().is_empty(), "{:?}", device.validation_errors());
        assert_eq!(device.presented_frames(), 5);
    }

    #[test]
    fn test_slots_are_not_reused_in_flight() {
        let config = config(2, 2, ThreadingMode::Threaded);
        let device = device(&config, Duration::from_millis(2));
        let mut renderer =
            FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(16, 2), &config).unwrap();
        let reports = run(&mut renderer, 8);

        for (frame, report) in reports.iter().enumerate() {
            assert_eq!(report.frame_number, frame as u64);
            assert_eq!(report.slot_index, frame % 2);
            assert!(
                report.completed_at_reset >= report.retire_wait.fence_value,
                "frame {frame} reset slot {} at fence {} before {} retired",
                report.slot_index,
                report.completed_at_reset,
                report.retire_wait.fence_value
            );

            let previous_use = frame.checked_sub(2).map_or(0, |earlier| reports[earlier].fence_value);
            assert_eq!(report.retire_wait.fence_value, previous_use);
        }
    }

    #[test]
    fn test_shadow_map_alternates_once_per_use() {
        let config = config(3, 2, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        let mut renderer =
            FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(24, 3), &config).unwrap();
        run(&mut renderer, 6);

        let cycle = [
            (ResourceState::DepthWritable, ResourceState::ShaderReadable),
            (ResourceState::ShaderReadable, ResourceState::DepthWritable),
        ];
        for slot in renderer.ring().slots() {
            let log = device.transition_log(slot.shadow_map());
            assert_eq!(log.len(), 6);
            assert!(log.chunks(2).all(|pair| pair == cycle));
            assert_eq!(device.resource_state(slot.shadow_map()), Some(ResourceState::DepthWritable));
            assert_eq!(slot.shadow_map_state(), ResourceState::DepthWritable);
        }
        assert!(device.validation_errors().is_empty(), "{:?}", device.validation_errors());
    }

    #[test]
    fn test_fourth_frame_waits_for_first() {
        let config = config(3, 3, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        let mut renderer =
            FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(24, 4), &config).unwrap();
        let camera = Camera::new();
        let lights = LightRig::new(config.viewport);

        device.pause();
        let first: Vec<FrameReport> = (0..3)
            .map(|_| renderer.render_frame(&camera, &lights).unwrap())
            .collect();
        assert!(first.iter().all(|report| !report.retire_wait.blocked));

        let (done, finished) = crossbeam_channel::bounded(1);
        let fourth = thread::spawn(move || {
            let report = renderer.render_frame(&camera, &lights);
            done.send(()).ok();
            (renderer, report)
        });

        assert!(finished.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(device.completed_value(), 1);

        device.resume();
        finished.recv_timeout(Duration::from_secs(10)).unwrap();
        let (mut renderer, report) = fourth.join().unwrap();
        let report = report.unwrap();

        assert_eq!(report.slot_index, 0);
        assert!(report.retire_wait.blocked);
        assert_eq!(report.retire_wait.fence_value, first[0].fence_value);
        assert!(report.completed_at_reset >= first[0].fence_value);
        renderer.shutdown().unwrap();
    }

    #[test]
    fn test_inline_and_threaded_produce_the_same_frames() {
        let scene = SceneDescription::synthetic(48, 4);
        let mut outputs = Vec::new();

        for threading in [ThreadingMode::Threaded, ThreadingMode::Inline] {
            let config = config(3, 3, threading);
            let device = device(&config, Duration::ZERO);
            let mut renderer = FrameRenderer::new(Arc::clone(&device), scene.clone(), &config).unwrap();
            run(&mut renderer, 4);

            let scene_lists: Vec<Vec<u32>> = (0..3)
                .map(|worker| draw_starts(renderer.ring().acquire(0).scene_list(worker).commands()))
                .collect();
            outputs.push((device.queue_log(), device.front_buffer(), scene_lists));
        }

        assert_eq!(outputs[0], outputs[1]);
        assert!(outputs[0].1.iter().any(|&texel| texel != 0));
    }

    #[test]
    fn test_single_inline_worker_matches_threaded_pool() {
        let scene = SceneDescription::synthetic(48, 4);

        let single = config(1, 3, ThreadingMode::Inline);
        let single_device = device(&single, Duration::ZERO);
        let mut renderer = FrameRenderer::new(Arc::clone(&single_device), scene.clone(), &single).unwrap();
        run(&mut renderer, 3);
        let in_order = draw_starts(renderer.ring().acquire(0).scene_list(0).commands());

        let pooled = config(3, 3, ThreadingMode::Threaded);
        let pooled_device = device(&pooled, Duration::ZERO);
        let mut renderer = FrameRenderer::new(Arc::clone(&pooled_device), scene.clone(), &pooled).unwrap();
        run(&mut renderer, 3);

        let expected: Vec<u32> = scene.draws.iter().map(|draw| draw.index_start).collect();
        assert_eq!(in_order, expected);

        let mut pooled_draws: Vec<u32> = (0..3)
            .flat_map(|worker| draw_starts(renderer.ring().acquire(0).scene_list(worker).commands()))
            .collect();
        pooled_draws.sort_unstable();
        assert_eq!(pooled_draws, expected);

        assert_eq!(single_device.front_buffer(), pooled_device.front_buffer());
        assert!(single_device.validation_errors().is_empty());
        assert!(pooled_device.validation_errors().is_empty());
    }

    #[test]
    fn test_more_workers_than_draws() {
        let config = config(5, 2, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        let mut renderer =
            FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(3, 1), &config).unwrap();
        run(&mut renderer, 2);

        assert!(device.validation_errors().is_empty(), "{:?}", device.validation_errors());
        assert!(draw_starts(renderer.ring().acquire(0).shadow_list(4).commands()).is_empty());
    }

    #[test]
    fn test_resource_failure_aborts_init() {
        let config = config(2, 3, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        // scene uploads succeed, the ring does not
        device.fail_resource_creation_after(5);

        let result = FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(8, 2), &config);
        assert!(matches!(result, Err(RenderError::ResourceCreation { .. })));
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let config = config(0, 3, ThreadingMode::Threaded);
        let device = device(&RendererConfig::default().with_viewport(32, 32), Duration::ZERO);
        let result = FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(8, 2), &config);
        assert!(matches!(result, Err(RenderError::InvalidConfig(_))));

        let mut scene = SceneDescription::synthetic(8, 2);
        scene.draws[3].diffuse_texture_index = 9;
        let result = FrameRenderer::new(device, scene, &RendererConfig::default().with_viewport(32, 32));
        assert!(matches!(result, Err(RenderError::ResourceCreation { .. })));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let config = config(3, 3, ThreadingMode::Threaded);
        let device = device(&config, Duration::ZERO);
        let mut renderer =
            FrameRenderer::new(Arc::clone(&device), SceneDescription::synthetic(12, 2), &config).unwrap();
        let camera = Camera::new();
        let lights = LightRig::new(config.viewport);

        renderer.render_frame(&camera, &lights).unwrap();
        renderer.render_frame(&camera, &lights).unwrap();
        renderer.shutdown().unwrap();
        renderer.shutdown().unwrap();

        assert_eq!(device.completed_value(), renderer.fence_value());
        assert_eq!(renderer.frame_count(), 2);
        assert!(renderer.render_frame(&camera, &lights).is_err());
    }

    /// Headless device whose `execute` call number `fail_at` (1-based) is refused
    struct RefusingDevice {
        inner: Arc<HeadlessDevice>,
        executes: AtomicUsize,
        fail_at: usize,
    }

    impl Device for RefusingDevice {
        fn create_buffer(&self, label: &str, bytes: &[u8]) -> RenderResult<ResourceId> {
            self.inner.create_buffer(label, bytes)
        }

        fn create_upload_buffer(&self, label: &str, size: usize) -> RenderResult<ResourceId> {
            self.inner.create_upload_buffer(label, size)
        }

        fn write_upload_buffer(&self, id: ResourceId, bytes: &[u8]) -> RenderResult<()> {
            self.inner.write_upload_buffer(id, bytes)
        }

        fn create_texture(&self, desc: &TextureDesc<'_>) -> RenderResult<ResourceId> {
            self.inner.create_texture(desc)
        }

        fn back_buffer_count(&self) -> usize {
            self.inner.back_buffer_count()
        }

        fn back_buffer(&self, index: usize) -> RenderResult<ResourceId> {
            self.inner.back_buffer(index)
        }

        fn current_back_buffer_index(&self) -> usize {
            self.inner.current_back_buffer_index()
        }

        fn execute(&self, batch: &[RecordedCommands]) -> RenderResult<()> {
            if self.executes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
                return Err(RenderError::Submission("queue full".to_string()));
            }
            self.inner.execute(batch)
        }

        fn signal(&self, value: u64) -> RenderResult<()> {
            self.inner.signal(value)
        }

        fn completed_value(&self) -> u64 {
            self.inner.completed_value()
        }

        fn wait_for_value(&self, value: u64) -> RenderResult<()> {
            self.inner.wait_for_value(value)
        }

        fn present(&self) -> RenderResult<()> {
            self.inner.present()
        }
    }

    #[test]
    fn test_failed_frame_stops_rendering() {
        let config = config(1, 1, ThreadingMode::Threaded);
        let headless = device(&config, Duration::ZERO);
        // the scene batch of the first frame is refused
        let refusing = Arc::new(RefusingDevice {
            inner: Arc::clone(&headless),
            executes: AtomicUsize::new(0),
            fail_at: 2,
        });
        let mut renderer =
            FrameRenderer::new(refusing, SceneDescription::synthetic(6, 2), &config).unwrap();
        let camera = Camera::new();
        let lights = LightRig::new(config.viewport);

        assert!(matches!(
            renderer.render_frame(&camera, &lights),
            Err(RenderError::Submission(_))
        ));
        assert!(renderer.has_failed());

        assert!(renderer.render_frame(&camera, &lights).is_err());
        assert!(renderer.render_frame(&camera, &lights).is_err());
        renderer.shutdown().unwrap();

        // the shadow map never went back to DepthWritable on the device
        let shadow_map = renderer.ring().acquire(0).shadow_map();
        assert_eq!(headless.resource_state(shadow_map), Some(ResourceState::ShaderReadable));

        assert!(headless.validation_errors().is_empty(), "{:?}", headless.validation_errors());
        assert_eq!(headless.presented_frames(), 0);
        assert_eq!(renderer.frame_count(), 0);
    }
}
