//! Frame resource ring

use std::sync::atomic::{AtomicU64, Ordering};

use super::slot::FrameResourceSlot;
use crate::config::Viewport;
use crate::render::device::Device;
use crate::render::error::RenderResult;

/// Outcome of waiting for a slot to retire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireWait {
    /// Fence value the slot's previous submission signals
    pub fence_value: u64,
    /// Whether the host had to block for the device
    pub blocked: bool,
}

/// Fixed ring of frame slots, each guarded by a retire fence value
pub struct FrameRing {
    slots: Vec<FrameResourceSlot>,
    retire_fences: Vec<AtomicU64>,
}

impl FrameRing {
    /// Create `depth` slots, each with list pairs for `worker_count` workers
    pub fn new(
        device: &dyn Device,
        depth: usize,
        worker_count: usize,
        viewport: Viewport,
    ) -> RenderResult<Self> {
        let slots = (0..depth)
            .map(|index| FrameResourceSlot::new(device, index, worker_count, viewport))
            .collect::<RenderResult<Vec<_>>>()?;
        let retire_fences = (0..depth).map(|_| AtomicU64::new(0)).collect();

        Ok(Self { slots, retire_fences })
    }

    /// Number of slots (frames in flight)
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Slot at `index`
    pub fn acquire(&self, index: usize) -> &FrameResourceSlot {
        &self.slots[index]
    }

    /// Every slot in ring order
    pub fn slots(&self) -> impl Iterator<Item = &FrameResourceSlot> {
        self.slots.iter()
    }

    /// Fence value recorded for the slot's last submission
    pub fn retire_fence(&self, index: usize) -> u64 {
        self.retire_fences[index].load(Ordering::Acquire)
    }

    /// Record the fence value that retires the slot's latest submission
    pub fn mark_retire_fence(&self, index: usize, value: u64) {
        let previous = self.retire_fences[index].swap(value, Ordering::AcqRel);
        debug_assert!(previous <= value, "retire fence of slot {index} went backwards");
    }

    /// Block until the device has retired the slot's previous submission
    pub fn wait_until_retired(&self, index: usize, device: &dyn Device) -> RenderResult<RetireWait> {
        let fence_value = self.retire_fence(index);
        let completed = device.completed_value();

        if completed >= fence_value {
            return Ok(RetireWait {
                fence_value,
                blocked: false,
            });
        }

        log::debug!("slot {index} waiting for fence {fence_value} (device at {completed})");
        device.wait_for_value(fence_value)?;
        Ok(RetireWait {
            fence_value,
            blocked: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessConfig, HeadlessDevice};
    use std::sync::Arc;
    use std::time::Duration;

    fn device() -> HeadlessDevice {
        HeadlessDevice::new(HeadlessConfig {
            back_buffer_count: 2,
            width: 4,
            height: 4,
            execute_latency: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn test_fresh_slots_never_block() {
        let device = device();
        let ring = FrameRing::new(&device, 3, 2, Viewport::new(4, 4)).unwrap();

        assert_eq!(ring.depth(), 3);
        for index in 0..3 {
            assert_eq!(ring.acquire(index).index(), index);
            let wait = ring.wait_until_retired(index, &device).unwrap();
            assert!(!wait.blocked);
            assert_eq!(wait.fence_value, 0);
        }
    }

    #[test]
    fn test_wait_blocks_until_fence_retires() {
        let device = Arc::new(device());
        let ring = Arc::new(FrameRing::new(&*device, 2, 1, Viewport::new(4, 4)).unwrap());

        device.pause();
        device.signal(7).unwrap();
        ring.mark_retire_fence(1, 7);

        let waiter = {
            let device = Arc::clone(&device);
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || ring.wait_until_retired(1, &*device).unwrap())
        };

        std::thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished());

        device.resume();
        let wait = waiter.join().unwrap();
        assert_eq!(wait, RetireWait { fence_value: 7, blocked: true });
        assert!(device.completed_value() >= 7);
    }

    #[test]
    fn test_creation_failure_aborts_ring() {
        let device = device();
        // first slot succeeds, second fails on its shadow map
        device.fail_resource_creation_after(3);
        assert!(FrameRing::new(&device, 2, 1, Viewport::new(4, 4)).is_err());
    }
}
