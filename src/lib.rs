//! Pooled Cache - A namespaced, compressing cache client
//!
//! Sits in front of a Redis (or in-process) key-value store and provides
//! read/write/fetch/increment/delete with key namespacing, expiration,
//! threshold-gated compression, pipelined multi-key fetches and pluggable
//! instrumentation, over a bounded connection pool.

pub mod cache;
pub mod config;
pub mod error;
pub mod instrument;
pub mod store;
pub mod tasks;

pub use cache::{Cache, Options};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use instrument::{
    Event, Instrumenter, NoopInstrumenter, Operation, Outcome, TracingInstrumenter,
};
pub use store::MemoryStore;
pub use tasks::spawn_cleanup_task;
