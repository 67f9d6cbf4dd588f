//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Purges expired entries from an in-process store at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
