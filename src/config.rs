use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chain::{ACTION_PREFIXES, PALETTE};
use crate::schema::DEFAULT_SPECIAL_GROUPS;

/// Complete configuration for loading episodes and drawing chains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DredgeConfig {
    pub dataset: DatasetConfig,
    pub schema: SchemaConfig,
    pub video: VideoConfig,
    pub chain: ChainConfig,
}

/// Where the recordings live and how one episode directory is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory holding one sub-directory per episode.
    pub root: PathBuf,
    /// Task whose schema applies to the recordings (default: "MineRLObtainDiamond-v0").
    pub task_id: String,
    #[serde(flatten)]
    pub layout: EpisodeLayout,
}

/// File names inside an episode directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeLayout {
    /// Numeric archive (default: "rendered.npz").
    pub archive_file: String,
    /// Video recording (default: "recording.mp4").
    pub video_file: String,
    /// Observation key the decoded frames are stored under (default: "pov").
    pub video_key: String,
}

/// Schema selection and storage policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Groups whose children are stored as separate consecutive fields
    /// (default: ["equipped_items", "mainhand"]).
    pub special_groups: Vec<String>,
    /// Optional JSON file with custom task schemas; built-in MineRL schemas
    /// are used when unset.
    pub schema_file: Option<PathBuf>,
}

/// External video decoder programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

/// Chain graph appearance and the layout program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// The two alternating vertex fill colors.
    pub palette: [String; 2],
    /// Token prefixes that mark an action rather than an item.
    pub action_prefixes: Vec<String>,
    /// Graphviz layout program (default: "dot").
    pub dot_bin: String,
    /// Output image format (default: "png").
    pub format: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            task_id: "MineRLObtainDiamond-v0".into(),
            layout: EpisodeLayout::default(),
        }
    }
}

impl Default for EpisodeLayout {
    fn default() -> Self {
        Self {
            archive_file: "rendered.npz".into(),
            video_file: "recording.mp4".into(),
            video_key: "pov".into(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            special_groups: DEFAULT_SPECIAL_GROUPS.iter().map(|s| s.to_string()).collect(),
            schema_file: None,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".into(),
            ffprobe_bin: "ffprobe".into(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            palette: PALETTE.map(String::from),
            action_prefixes: ACTION_PREFIXES.iter().map(|s| s.to_string()).collect(),
            dot_bin: "dot".into(),
            format: "png".into(),
        }
    }
}

impl DredgeConfig {
    /// Read the configuration from a JSON file, or use the defaults when no
    /// path is given. Program paths can be overridden through
    /// `DREDGE_FFMPEG`, `DREDGE_FFPROBE` and `DREDGE_DOT`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str::<DredgeConfig>(&text)
                    .with_context(|| format!("Failed to parse config from {}", path.display()))?
            }
            None => DredgeConfig::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bin) = lookup("DREDGE_FFMPEG") {
            self.video.ffmpeg_bin = bin;
        }
        if let Some(bin) = lookup("DREDGE_FFPROBE") {
            self.video.ffprobe_bin = bin;
        }
        if let Some(bin) = lookup("DREDGE_DOT") {
            self.chain.dot_bin = bin;
        }
    }
}
