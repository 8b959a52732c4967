//! Per-frame resources
//!
//! A [`FrameRing`] holds one [`FrameResourceSlot`] per frame in flight. The
//! orchestrator cycles through the ring, and a slot is only recycled once the
//! device has passed the fence value of the slot's previous submission.

mod ring;
mod slot;

pub use ring::{FrameRing, RetireWait};
pub use slot::{FrameList, FrameResourceSlot};
