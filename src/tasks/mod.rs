//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Sweep: Removes expired in-memory entries at configured intervals

mod cleanup;

pub use cleanup::spawn_sweep_task;
