//! Per-episode numeric archives.
//!
//! An archive is an ordered set of named arrays: `reward`, the `action_*`
//! fields and the `observation_*` fields of one recording. [`NpzArchive`]
//! reads the `rendered.npz` files of the dataset; [`MemoryArchive`] holds the
//! same data in memory.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpyError, ReadNpzError, ReadableElement};

use super::tensor::Tensor;
use crate::error::LoadError;

/// Ordered, named arrays of one episode.
pub trait EpisodeArchive {
    /// Field names in the order the archive stores them.
    fn field_names(&self) -> &[String];

    /// Read one field.
    fn read(&mut self, name: &str) -> Result<Tensor, LoadError>;

    fn contains(&self, name: &str) -> bool {
        self.field_names().iter().any(|n| n == name)
    }
}

// ---------------------------------------------------------------------------
// NPZ files
// ---------------------------------------------------------------------------

/// An `.npz` archive on disk.
pub struct NpzArchive {
    path: PathBuf,
    reader: NpzReader<File>,
    /// Field names with the `.npy` member suffix removed.
    names: Vec<String>,
    /// Zip member names, parallel to `names`.
    members: Vec<String>,
}

impl NpzArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = NpzReader::new(file).map_err(|e| archive_error(&path, e))?;
        let members = reader.names().map_err(|e| archive_error(&path, e))?;
        let names = members
            .iter()
            .map(|m| m.strip_suffix(".npy").unwrap_or(m).to_string())
            .collect();
        Ok(Self {
            path,
            reader,
            names,
            members,
        })
    }

    /// Read a member as `T`, or `None` if it holds another element type.
    fn try_read<T: ReadableElement>(&mut self, member: &str) -> Result<Option<ArrayD<T>>, LoadError> {
        match self.reader.by_name::<OwnedRepr<T>, IxDyn>(member) {
            Ok(array) => Ok(Some(array)),
            Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
            Err(e) => Err(archive_error(&self.path, e)),
        }
    }
}

impl EpisodeArchive for NpzArchive {
    fn field_names(&self) -> &[String] {
        &self.names
    }

    fn read(&mut self, name: &str) -> Result<Tensor, LoadError> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| LoadError::MissingField(name.to_string()))?;
        let member = self.members[index].clone();

        if let Some(a) = self.try_read::<f32>(&member)? {
            return Ok(Tensor::F32(a));
        }
        if let Some(a) = self.try_read::<f64>(&member)? {
            return Ok(Tensor::F64(a));
        }
        if let Some(a) = self.try_read::<i64>(&member)? {
            return Ok(Tensor::I64(a));
        }
        if let Some(a) = self.try_read::<i32>(&member)? {
            return Ok(Tensor::I32(a));
        }
        if let Some(a) = self.try_read::<u8>(&member)? {
            return Ok(Tensor::U8(a));
        }
        if let Some(a) = self.try_read::<bool>(&member)? {
            return Ok(Tensor::Bool(a));
        }
        Err(LoadError::UnsupportedDtype(name.to_string()))
    }
}

fn archive_error(path: &Path, e: ReadNpzError) -> LoadError {
    LoadError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// In-memory archive
// ---------------------------------------------------------------------------

/// An archive assembled in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    names: Vec<String>,
    fields: Vec<Tensor>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.fields[i] = tensor,
            None => {
                self.names.push(name);
                self.fields.push(tensor);
            }
        }
    }
}

impl EpisodeArchive for MemoryArchive {
    fn field_names(&self) -> &[String] {
        &self.names
    }

    fn read(&mut self, name: &str) -> Result<Tensor, LoadError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.fields[i].clone())
            .ok_or_else(|| LoadError::MissingField(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use ndarray_npy::NpzWriter;

    #[test]
    fn test_npz_fields_keep_order_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rendered.npz");
        {
            let mut npz = NpzWriter::new(File::create(&path).unwrap());
            npz.add_array("reward", &arr1(&[0.0f64, 1.0])).unwrap();
            npz.add_array("action_attack", &arr1(&[true, false])).unwrap();
            npz.add_array("observation_inventory", &arr2(&[[1i64, 2], [3, 4], [5, 6]]))
                .unwrap();
            npz.add_array("action_camera", &arr2(&[[0.5f32, -0.5], [1.0, 0.0]]))
                .unwrap();
            npz.finish().unwrap();
        }

        let mut archive = NpzArchive::open(&path).unwrap();
        assert_eq!(
            archive.field_names(),
            &["reward", "action_attack", "observation_inventory", "action_camera"]
        );
        assert!(matches!(archive.read("reward").unwrap(), Tensor::F64(_)));
        assert!(matches!(archive.read("action_attack").unwrap(), Tensor::Bool(_)));
        let inventory = archive.read("observation_inventory").unwrap();
        assert_eq!(inventory.dtype(), "int64");
        assert_eq!(inventory.shape(), &[3, 2]);
        let camera = archive.read("action_camera").unwrap();
        assert_eq!(camera.to_f32_vec(), vec![0.5, -0.5, 1.0, 0.0]);

        assert!(matches!(
            archive.read("observation_pov"),
            Err(LoadError::MissingField(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NpzArchive::open(dir.path().join("absent.npz")).err().unwrap();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_memory_archive_replaces_in_place() {
        let mut archive = MemoryArchive::new()
            .with_field("reward", Tensor::from(arr1(&[1.0f32]).into_dyn()))
            .with_field("action_jump", Tensor::from(arr1(&[0i64]).into_dyn()));
        archive.insert("reward", Tensor::from(arr1(&[2.0f32]).into_dyn()));

        assert_eq!(archive.field_names(), &["reward", "action_jump"]);
        assert_eq!(archive.read("reward").unwrap().to_f32_vec(), vec![2.0]);
        assert!(archive.contains("action_jump"));
        assert!(!archive.contains("observation_pov"));
    }
}
