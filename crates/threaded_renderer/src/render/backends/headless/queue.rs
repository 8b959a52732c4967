//! Queue thread of the headless device
//!
//! Submissions, fence signals and presents are sent over a channel and
//! processed strictly in order by a single thread, the way a hardware queue
//! consumes its ring buffer.

use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::executor::ResourceTable;
use super::QueueEvent;
use crate::render::commands::RecordedCommands;
use crate::render::device::ResourceId;
use crate::render::error::{RenderError, RenderResult};

/// Work item for the queue thread
pub(super) enum QueueOp {
    Execute(Vec<RecordedCommands>),
    Signal(u64),
    Present { index: usize, back_buffer: ResourceId },
    Shutdown,
}

#[derive(Debug)]
struct FenceState {
    completed: u64,
    running: bool,
}

/// State shared between the device handle and its queue thread
pub(super) struct QueueShared {
    pub resources: Mutex<ResourceTable>,
    pub events: Mutex<Vec<QueueEvent>>,
    pub front_buffer: Mutex<Vec<u32>>,
    pub presented: AtomicU64,
    fence: Mutex<FenceState>,
    fence_changed: Condvar,
    paused: Mutex<bool>,
    pause_changed: Condvar,
}

impl QueueShared {
    pub fn new(resources: ResourceTable) -> Self {
        Self {
            resources: Mutex::new(resources),
            events: Mutex::new(Vec::new()),
            front_buffer: Mutex::new(Vec::new()),
            presented: AtomicU64::new(0),
            fence: Mutex::new(FenceState {
                completed: 0,
                running: true,
            }),
            fence_changed: Condvar::new(),
            paused: Mutex::new(false),
            pause_changed: Condvar::new(),
        }
    }

    pub fn completed_value(&self) -> u64 {
        self.fence.lock().completed
    }

    pub fn wait_for_value(&self, value: u64) -> RenderResult<()> {
        let mut fence = self.fence.lock();
        while fence.completed < value {
            if !fence.running {
                return Err(RenderError::DeviceLost(format!(
                    "queue stopped at fence {} while waiting for {value}",
                    fence.completed
                )));
            }
            self.fence_changed.wait(&mut fence);
        }
        Ok(())
    }

    pub fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.pause_changed.notify_all();
    }

    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.pause_changed.wait(&mut paused);
        }
    }

    fn complete(&self, value: u64) {
        let mut fence = self.fence.lock();
        fence.completed = fence.completed.max(value);
        self.fence_changed.notify_all();
    }

    fn stop(&self) {
        self.fence.lock().running = false;
        self.fence_changed.notify_all();
    }
}

/// Queue thread body; returns once a shutdown op arrives or every sender is gone
fn run(shared: &QueueShared, ops: &Receiver<QueueOp>, execute_latency: Duration) {
    log::debug!("headless queue started");

    while let Ok(op) = ops.recv() {
        shared.wait_while_paused();

        match op {
            QueueOp::Execute(batch) => {
                if !execute_latency.is_zero() {
                    std::thread::sleep(execute_latency);
                }
                let draw_count: usize = {
                    let mut resources = shared.resources.lock();
                    batch.iter().map(|list| resources.execute(list)).sum()
                };
                let labels = batch.iter().map(|list| list.label().to_string()).collect();
                shared.events.lock().push(QueueEvent::Execute { labels, draw_count });
            }
            QueueOp::Signal(value) => {
                shared.events.lock().push(QueueEvent::Signal(value));
                shared.complete(value);
            }
            QueueOp::Present { index, back_buffer } => {
                let texels = shared.resources.lock().present(back_buffer);
                if let Some(texels) = texels {
                    *shared.front_buffer.lock() = texels;
                }
                shared.presented.fetch_add(1, Ordering::AcqRel);
                shared.events.lock().push(QueueEvent::Present { back_buffer: index });
            }
            QueueOp::Shutdown => break,
        }
    }

    shared.stop();
    log::debug!("headless queue stopped at fence {}", shared.completed_value());
}

/// Spawn the queue thread
pub(super) fn spawn(
    shared: Arc<QueueShared>,
    ops: Receiver<QueueOp>,
    execute_latency: Duration,
) -> RenderResult<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("headless-queue".to_string())
        .spawn(move || run(&shared, &ops, execute_latency))
        .map_err(|e| RenderError::DeviceLost(format!("failed to start queue thread: {e}")))
}
