//! Target schemas and the flat-list → tree mapper.
//!
//! - [`space`] -- schema nodes, task schemas, built-in and file-backed
//!   schema providers.
//! - [`mapper`] -- [`SchemaMapper`], the recursive reconstruction of nested
//!   trees from an archive's flat field list, driven by a [`StoragePolicy`].

pub mod mapper;
pub mod space;

pub use mapper::{SchemaMapper, StoragePolicy, DEFAULT_SPECIAL_GROUPS};
pub use space::{BuiltinSchemas, FileSchemas, SchemaNode, SchemaProvider, TaskSchema};
