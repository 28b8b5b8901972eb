//! Episode loading: archives, video frames and the aligned trajectory record.
//!
//! This module provides:
//! - [`tensor::Tensor`] -- the typed n-dimensional arrays stored in archives.
//! - [`archive::EpisodeArchive`] -- named arrays of one episode, backed by an
//!   `.npz` file ([`archive::NpzArchive`]) or memory.
//! - [`frames::align_suffix`] -- decoding the trailing frames of a recording
//!   through a [`frames::FrameSource`] such as [`frames::FfmpegSource`].
//! - [`loader::TrajectoryLoader`] -- combines both into a
//!   [`types::TrajectoryRecord`].
//! - [`scan::trajectory_names`] -- lists the episodes of a dataset directory.

pub mod archive;
pub mod frames;
pub mod loader;
pub mod scan;
pub mod tensor;
pub mod types;

// Re-export the most commonly used items at the module level.
pub use archive::{EpisodeArchive, MemoryArchive, NpzArchive};
pub use frames::{align_suffix, FfmpegSource, FrameReader, FrameSource, VecFrameSource};
pub use loader::TrajectoryLoader;
pub use scan::trajectory_names;
pub use tensor::{FieldShape, Frame, Tensor};
pub use types::{RecordSummary, TrajectoryRecord, Tree};
