//! Cache Module
//!
//! The cache façade and the small collaborators it composes per call:
//! option resolution, key namespacing and value compression.

mod compression;
mod facade;
mod namespace;
mod options;


// Re-export public types
pub use compression::{compress, decompress, is_compressed, Compressor, COMPRESSED_MARKER};
pub use facade::{Cache, CLEAR_ALL_KEY};
pub use namespace::{namespace_key, NAMESPACE_SEPARATOR};
pub use options::{Options, ResolvedOptions};
