//! Episode loading: aligning the numeric archive with the video recording.
//!
//! The [`TrajectoryLoader`] turns one episode directory into a
//! [`TrajectoryRecord`] by:
//!   1. reading `reward` and the `action_*` / `observation_*` fields,
//!   2. decoding the trailing `steps + 1` video frames,
//!   3. splitting every observation into a current and a next slice,
//!   4. rebuilding the nested observation and action trees from the schema.
//!
//! Use [`TrajectoryLoader::load_data_no_video`] when the frames are not
//! needed: the video is then never decoded.

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{DredgeConfig, EpisodeLayout, VideoConfig};
use crate::error::{LoadError, SchemaError};
use crate::schema::{
    BuiltinSchemas, FileSchemas, SchemaMapper, SchemaProvider, StoragePolicy, TaskSchema,
};
use crate::trajectory::archive::{EpisodeArchive, NpzArchive};
use crate::trajectory::frames::{align_suffix, FfmpegSource, FrameSource};
use crate::trajectory::tensor::Tensor;
use crate::trajectory::types::TrajectoryRecord;

/// Mandatory per-step reward field.
pub const REWARD_KEY: &str = "reward";
pub const ACTION_PREFIX: &str = "action_";
pub const OBSERVATION_PREFIX: &str = "observation_";

/// Loads episode directories into [`TrajectoryRecord`]s for one task schema.
#[derive(Debug, Clone)]
pub struct TrajectoryLoader {
    layout: EpisodeLayout,
    video: VideoConfig,
    schema: TaskSchema,
    mapper: SchemaMapper,
}

impl TrajectoryLoader {
    pub fn new(
        layout: EpisodeLayout,
        video: VideoConfig,
        schema: TaskSchema,
        mapper: SchemaMapper,
    ) -> Self {
        Self {
            layout,
            video,
            schema,
            mapper,
        }
    }

    /// Build a loader for the configured task, reading custom schemas from
    /// `schema.schema_file` when one is set.
    pub fn from_config(config: &DredgeConfig) -> Result<Self, SchemaError> {
        let task = &config.dataset.task_id;
        let schema = match &config.schema.schema_file {
            Some(path) => FileSchemas::load_from_file(path)?.schema(task)?,
            None => BuiltinSchemas.schema(task)?,
        };
        let policy = StoragePolicy::new(config.schema.special_groups.iter().cloned());
        Ok(Self::new(
            config.dataset.layout.clone(),
            config.video.clone(),
            schema,
            SchemaMapper::new(policy),
        ))
    }

    pub fn schema(&self) -> &TaskSchema {
        &self.schema
    }

    /// Load the episode stored in `dir`, skipping every top-level key in
    /// `ignore_keys`.
    pub fn load_data(
        &self,
        dir: impl AsRef<Path>,
        ignore_keys: &BTreeSet<String>,
    ) -> Result<TrajectoryRecord, LoadError> {
        let dir = dir.as_ref();
        let mut archive = NpzArchive::open(dir.join(&self.layout.archive_file))?;
        let video = FfmpegSource::new(
            dir.join(&self.layout.video_file),
            &self.video.ffmpeg_bin,
            &self.video.ffprobe_bin,
        );
        let record = self.load_from(&mut archive, &video, ignore_keys)?;
        tracing::info!(
            episode = %dir.display(),
            steps = record.len(),
            reward = record.total_reward(),
            "Loaded episode"
        );
        Ok(record)
    }

    /// Load the episode in `dir` without decoding its video.
    pub fn load_data_no_video(&self, dir: impl AsRef<Path>) -> Result<TrajectoryRecord, LoadError> {
        let ignore = BTreeSet::from([self.layout.video_key.clone()]);
        self.load_data(dir, &ignore)
    }

    /// Build a record from any archive and frame source.
    ///
    /// `video` is only opened when the video key is not ignored.
    pub fn load_from<A, S>(
        &self,
        archive: &mut A,
        video: &S,
        ignore_keys: &BTreeSet<String>,
    ) -> Result<TrajectoryRecord, LoadError>
    where
        A: EpisodeArchive + ?Sized,
        S: FrameSource + ?Sized,
    {
        if !archive.contains(REWARD_KEY) {
            return Err(LoadError::MissingField(REWARD_KEY.to_string()));
        }
        let reward_field = archive.read(REWARD_KEY)?;
        let steps = reward_field.len();
        let reward = reward_field.to_f32_vec();
        if reward.len() != steps {
            return Err(LoadError::ShapeMismatch {
                field: REWARD_KEY.to_string(),
                expected: steps,
                actual: reward.len(),
            });
        }
        if steps == 0 {
            return Err(LoadError::EmptyEpisode);
        }

        let mut done = vec![false; steps];
        done[steps - 1] = true;

        let video_key = self.layout.video_key.as_str();
        let load_video = !ignore_keys.contains(video_key);
        let skipped = |field: &str| ignore_keys.contains(top_level_key(field));

        let names = archive.field_names().to_vec();

        let mut actions = Vec::new();
        for name in &names {
            let Some(field) = name.strip_prefix(ACTION_PREFIX) else {
                continue;
            };
            if skipped(field) {
                continue;
            }
            let tensor = archive.read(name)?;
            expect_rows(name, &tensor, steps)?;
            actions.push(tensor);
        }

        let mut current = Vec::new();
        let mut next = Vec::new();
        for name in &names {
            let Some(field) = name.strip_prefix(OBSERVATION_PREFIX) else {
                continue;
            };
            // Decoded frames stand in for any stored copy of the video field.
            if skipped(field) || field == video_key {
                continue;
            }
            let (head, tail) = shift(name, &archive.read(name)?, steps)?;
            current.push(head);
            next.push(tail);
        }
        tracing::debug!(
            actions = actions.len(),
            observations = current.len(),
            steps,
            "Partitioned archive fields"
        );

        if load_video {
            let frames = align_suffix(video, steps + 1)?;
            let stacked = Tensor::from_frames(&frames)
                .ok_or_else(|| LoadError::Video("decoded frames differ in size".into()))?;
            let (head, tail) = shift(video_key, &stacked, steps)?;
            current.push(head);
            next.push(tail);
        }

        let observation = self
            .mapper
            .map_to_dict(&current, &self.schema.observation, ignore_keys)?;
        let next_observation = self
            .mapper
            .map_to_dict(&next, &self.schema.observation, ignore_keys)?;
        let action = self
            .mapper
            .map_to_dict(&actions, &self.schema.action, ignore_keys)?;

        Ok(TrajectoryRecord {
            observation,
            action,
            reward,
            next_observation,
            done,
        })
    }
}

/// `"equipped_items.mainhand.type"` -> `"equipped_items"`.
fn top_level_key(field: &str) -> &str {
    field.split_once('.').map_or(field, |(head, _)| head)
}

fn expect_rows(name: &str, tensor: &Tensor, expected: usize) -> Result<(), LoadError> {
    if tensor.ndim() == 0 || tensor.len() != expected {
        return Err(LoadError::ShapeMismatch {
            field: name.to_string(),
            expected,
            actual: tensor.len(),
        });
    }
    Ok(())
}

/// Split `steps + 1` rows into the current rows `[0, steps)` and the next
/// rows `[1, steps]`.
fn shift(name: &str, tensor: &Tensor, steps: usize) -> Result<(Tensor, Tensor), LoadError> {
    expect_rows(name, tensor, steps + 1)?;
    let mismatch = || LoadError::ShapeMismatch {
        field: name.to_string(),
        expected: steps + 1,
        actual: tensor.len(),
    };
    let head = tensor.slice_rows(0..steps).ok_or_else(mismatch)?;
    let tail = tensor.slice_rows(1..steps + 1).ok_or_else(mismatch)?;
    Ok((head, tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaNode;
    use crate::trajectory::archive::MemoryArchive;
    use crate::trajectory::frames::{FrameReader, VecFrameSource};
    use crate::trajectory::tensor::Frame;
    use ndarray::{arr1, arr2, Array2};

    const STEPS: usize = 4;

    fn schema() -> TaskSchema {
        TaskSchema {
            observation: SchemaNode::group([
                (
                    "equipped_items",
                    SchemaNode::group([("mainhand", SchemaNode::leaves(&["damage", "type"]))]),
                ),
                ("inventory", SchemaNode::leaves(&["dirt", "log"])),
                ("pov", SchemaNode::Leaf),
            ]),
            action: SchemaNode::leaves(&["attack", "craft"]),
        }
    }

    fn loader() -> TrajectoryLoader {
        TrajectoryLoader::new(
            EpisodeLayout::default(),
            VideoConfig::default(),
            schema(),
            SchemaMapper::default(),
        )
    }

    /// Observations carry `STEPS + 1` rows whose values encode the row index.
    fn archive() -> MemoryArchive {
        let rows = STEPS + 1;
        let inventory = Array2::from_shape_fn((rows, 2), |(r, c)| (r * 10 + c) as i64);
        MemoryArchive::new()
            .with_field(
                "action_attack",
                Tensor::from(arr1(&[1i64, 0, 1, 1]).into_dyn()),
            )
            .with_field(
                "action_craft",
                Tensor::from(arr1(&[0i64, 2, 0, 0]).into_dyn()),
            )
            .with_field(
                "observation_equipped_items.mainhand.damage",
                Tensor::from(arr1(&[0i64, 0, 1, 2, 3]).into_dyn()),
            )
            .with_field(
                "observation_equipped_items.mainhand.type",
                Tensor::from(arr1(&[1i64, 1, 3, 3, 3]).into_dyn()),
            )
            .with_field("observation_inventory", Tensor::from(inventory.into_dyn()))
            .with_field("reward", Tensor::F64(arr1(&[0.0f64, 1.0, 0.0, 2.0]).into_dyn()))
    }

    /// Two leading frames before the experiment, then one frame per state.
    fn video() -> VecFrameSource {
        let frames = (0..STEPS + 3)
            .map(|i| Frame::from_elem((2, 2, 3), i as u8))
            .collect();
        VecFrameSource::new(frames)
    }

    fn no_ignore() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_done_and_reward() {
        let record = loader()
            .load_from(&mut archive(), &video(), &no_ignore())
            .unwrap();
        assert_eq!(record.len(), STEPS);
        assert_eq!(record.reward, vec![0.0, 1.0, 0.0, 2.0]);
        assert_eq!(record.done, vec![false, false, false, true]);
    }

    #[test]
    fn test_next_observation_is_shifted_by_one() {
        let record = loader()
            .load_from(&mut archive(), &video(), &no_ignore())
            .unwrap();

        let current = record.observation.leaves();
        let next = record.next_observation.leaves();
        assert_eq!(current.len(), next.len());
        for ((path, cur), (_, nxt)) in current.iter().zip(next.iter()) {
            assert_eq!(cur.len(), STEPS, "{path}");
            assert_eq!(nxt.len(), STEPS, "{path}");
            for i in 1..STEPS {
                assert_eq!(cur.row(i), nxt.row(i - 1), "{path} at step {i}");
            }
        }
    }

    #[test]
    fn test_trees_follow_schema() {
        let record = loader()
            .load_from(&mut archive(), &video(), &no_ignore())
            .unwrap();

        assert_eq!(
            record.observation.keys(),
            vec!["equipped_items", "inventory", "pov"]
        );
        let log = record.observation.get_path("inventory.log").unwrap();
        assert_eq!(
            log.as_leaf().unwrap(),
            &Tensor::from(arr1(&[1i64, 11, 21, 31]).into_dyn())
        );
        let kind = record
            .next_observation
            .get_path("equipped_items.mainhand.type")
            .unwrap();
        assert_eq!(
            kind.as_leaf().unwrap(),
            &Tensor::from(arr1(&[1i64, 3, 3, 3]).into_dyn())
        );
        let craft = record.action.get("craft").unwrap().as_leaf().unwrap();
        assert_eq!(craft, &Tensor::from(arr1(&[0i64, 2, 0, 0]).into_dyn()));
    }

    #[test]
    fn test_pov_uses_trailing_frames() {
        let record = loader()
            .load_from(&mut archive(), &video(), &no_ignore())
            .unwrap();
        let pov = record.observation.get("pov").unwrap().as_leaf().unwrap();
        assert_eq!(pov.shape(), &[STEPS, 2, 2, 3]);
        // Frames 0 and 1 precede the experiment; frame 2 is the first state.
        let Tensor::U8(frames) = pov else {
            panic!("pov should hold bytes");
        };
        assert_eq!(frames[[0, 0, 0, 0]], 2);
        assert_eq!(frames[[STEPS - 1, 0, 0, 0]], (STEPS + 1) as u8);

        let next = record.next_observation.get("pov").unwrap().as_leaf().unwrap();
        let Tensor::U8(next) = next else {
            panic!("pov should hold bytes");
        };
        assert_eq!(next[[STEPS - 1, 0, 0, 0]], (STEPS + 2) as u8);
    }

    /// A source that refuses to be opened.
    struct UnopenableVideo;

    impl FrameSource for UnopenableVideo {
        fn open(&self) -> Result<Box<dyn FrameReader + '_>, LoadError> {
            Err(LoadError::Video("video should not be decoded".into()))
        }
    }

    #[test]
    fn test_ignoring_pov_skips_video() {
        let ignore = BTreeSet::from(["pov".to_string()]);
        let record = loader()
            .load_from(&mut archive(), &UnopenableVideo, &ignore)
            .unwrap();
        assert!(record.observation.get("pov").is_none());
        assert!(record.next_observation.get("pov").is_none());
        assert_eq!(record.observation.keys(), vec!["equipped_items", "inventory"]);
    }

    #[test]
    fn test_insufficient_frames_fails_the_load() {
        let short = VecFrameSource::new(vec![Frame::zeros((2, 2, 3)); STEPS]);
        let err = loader()
            .load_from(&mut archive(), &short, &no_ignore())
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::InsufficientFrames {
                available: STEPS,
                required
            } if required == STEPS + 1
        ));
    }

    #[test]
    fn test_missing_reward() {
        let mut archive = MemoryArchive::new().with_field(
            "action_attack",
            Tensor::from(arr1(&[1i64]).into_dyn()),
        );
        let err = loader()
            .load_from(&mut archive, &video(), &no_ignore())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingField(ref f) if f == "reward"));
    }

    #[test]
    fn test_empty_episode() {
        let mut archive =
            MemoryArchive::new().with_field("reward", Tensor::from(arr1::<f32>(&[]).into_dyn()));
        let err = loader()
            .load_from(&mut archive, &video(), &no_ignore())
            .unwrap_err();
        assert!(matches!(err, LoadError::EmptyEpisode));
    }

    #[test]
    fn test_observation_without_trailing_state() {
        let mut archive = archive().with_field(
            "observation_inventory",
            Tensor::from(arr2(&[[0i64, 0], [0, 0], [0, 0], [0, 0]]).into_dyn()),
        );
        let err = loader()
            .load_from(&mut archive, &video(), &no_ignore())
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::ShapeMismatch { ref field, expected: 5, actual: 4 } if field == "observation_inventory"
        ));
    }

    #[test]
    fn test_schema_mismatch_is_reported() {
        let mut archive = archive().with_field(
            "action_jump",
            Tensor::from(arr1(&[0i64, 0, 0, 0]).into_dyn()),
        );
        let err = loader()
            .load_from(&mut archive, &video(), &no_ignore())
            .unwrap_err();
        assert!(matches!(err, LoadError::Schema(SchemaError::Unconsumed { .. })));
    }

    #[test]
    fn test_top_level_key() {
        assert_eq!(top_level_key("equipped_items.mainhand.type"), "equipped_items");
        assert_eq!(top_level_key("inventory"), "inventory");
    }

    #[test]
    fn test_from_config_uses_builtin_schema() {
        let loader = TrajectoryLoader::from_config(&DredgeConfig::default()).unwrap();
        assert_eq!(
            loader.schema(),
            &BuiltinSchemas.schema("MineRLObtainDiamond-v0").unwrap()
        );

        let mut config = DredgeConfig::default();
        config.dataset.task_id = "NotATask-v0".into();
        assert!(matches!(
            TrajectoryLoader::from_config(&config),
            Err(SchemaError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_load_npz_directory_without_video() {
        use ndarray_npy::NpzWriter;
        use std::fs::File;

        let dir = tempfile::tempdir().unwrap();
        {
            let mut npz = NpzWriter::new(File::create(dir.path().join("rendered.npz")).unwrap());
            npz.add_array("action_attack", &arr1(&[1i64, 0])).unwrap();
            npz.add_array("action_craft", &arr1(&[0i64, 3])).unwrap();
            npz.add_array("observation_equipped_items.mainhand.damage", &arr1(&[0i64, 0, 1]))
                .unwrap();
            npz.add_array("observation_equipped_items.mainhand.type", &arr1(&[1i64, 1, 2]))
                .unwrap();
            npz.add_array("observation_inventory", &arr2(&[[0i64, 1], [0, 2], [1, 2]]))
                .unwrap();
            npz.add_array("reward", &arr1(&[0.0f64, 1.0])).unwrap();
            npz.finish().unwrap();
        }

        let record = loader().load_data_no_video(dir.path()).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.done, vec![false, true]);
        assert_eq!(record.reward, vec![0.0, 1.0]);
        assert!(record.observation.get("pov").is_none());
        let log = record.next_observation.get_path("inventory.log").unwrap();
        assert_eq!(log.as_leaf().unwrap().to_f32_vec(), vec![2.0, 2.0]);
    }
}
