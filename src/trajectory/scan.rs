//! Discovery of episode directories in a dataset root.

use std::path::Path;

use crate::config::EpisodeLayout;
use crate::error::LoadError;

/// Names of the episode directories under `data_dir`, sorted.
///
/// A directory counts as an episode when it holds both the archive and the
/// video file named by `layout`.
pub fn trajectory_names(
    data_dir: impl AsRef<Path>,
    layout: &EpisodeLayout,
) -> Result<Vec<String>, LoadError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(data_dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if !path.join(&layout.archive_file).is_file() || !path.join(&layout.video_file).is_file() {
            tracing::debug!(dir = %path.display(), "Skipping incomplete episode directory");
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
