//! Error types shared by the loader and the schema mapper.
//!
//! Library code returns these typed errors so that callers can tell the
//! "not enough video frames" case apart from a corrupt archive. The binary and
//! the rendering glue wrap them in `anyhow` with context.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reconstructing a nested tree from a flat field list.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema asked for more positions than the flat list (or packed cell)
    /// provides.
    #[error("schema slot `{key}` needs position {index} but only {available} are available")]
    OutOfBounds {
        key: String,
        index: usize,
        available: usize,
    },

    /// Entries were left over after the whole schema had been walked.
    #[error("schema consumed {consumed} positions but the flat list holds {available}")]
    Unconsumed { consumed: usize, available: usize },

    /// A zero-dimensional value cannot hold the rows of a bundled group.
    #[error("schema group `{key}` cannot be read from a zero-dimensional value")]
    NotIndexable { key: String },

    /// The top-level schema node must be a group.
    #[error("top-level schema must be a group of named slots")]
    NotAGroup,

    #[error("no schema registered for task `{0}`")]
    UnknownTask(String),

    #[error("invalid schema definition: {0}")]
    Invalid(String),
}

/// Failures while loading one episode directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("archive is missing mandatory field `{0}`")]
    MissingField(String),

    #[error("episode has no recorded steps")]
    EmptyEpisode,

    /// The video holds fewer frames than the requested suffix.
    #[error("video provides {available} frames but {required} are required")]
    InsufficientFrames { available: usize, required: usize },

    #[error("field `{field}` has {actual} rows, expected {expected}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("field `{0}` has an element type that cannot be loaded")]
    UnsupportedDtype(String),

    #[error("failed to read archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("video decoder failed: {0}")]
    Video(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
