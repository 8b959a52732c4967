//! Device backend implementations
//!
//! Only the headless reference device ships with the crate. It executes
//! recorded command lists on the CPU and validates resource-state usage.

/// Headless CPU reference device
pub mod headless;
