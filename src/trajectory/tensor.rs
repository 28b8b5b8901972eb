//! Dynamically typed n-dimensional arrays as they come out of episode archives.
//!
//! Archive fields carry different element types (frame bytes, integer
//! inventory counts, float camera deltas, boolean key presses). [`Tensor`]
//! keeps each one in its native `ndarray` representation and exposes the few
//! shape operations the loader and schema mapper need.

use std::ops::Range;

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::Serialize;

/// A single decoded video frame (height x width x RGB).
pub type Frame = ndarray::Array3<u8>;

/// An n-dimensional array of one of the element types found in archives.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Apply an expression to the inner array and rewrap it in the same variant.
macro_rules! map_tensor {
    ($tensor:expr, $arr:ident => $body:expr) => {
        match $tensor {
            Tensor::Bool($arr) => Tensor::Bool($body),
            Tensor::U8($arr) => Tensor::U8($body),
            Tensor::I32($arr) => Tensor::I32($body),
            Tensor::I64($arr) => Tensor::I64($body),
            Tensor::F32($arr) => Tensor::F32($body),
            Tensor::F64($arr) => Tensor::F64($body),
        }
    };
}

/// Evaluate an expression against the inner array, whatever its element type.
macro_rules! with_tensor {
    ($tensor:expr, $arr:ident => $body:expr) => {
        match $tensor {
            Tensor::Bool($arr) => $body,
            Tensor::U8($arr) => $body,
            Tensor::I32($arr) => $body,
            Tensor::I64($arr) => $body,
            Tensor::F32($arr) => $body,
            Tensor::F64($arr) => $body,
        }
    };
}

impl Tensor {
    /// Short numpy-style name of the element type.
    pub fn dtype(&self) -> &'static str {
        match self {
            Tensor::Bool(_) => "bool",
            Tensor::U8(_) => "uint8",
            Tensor::I32(_) => "int32",
            Tensor::I64(_) => "int64",
            Tensor::F32(_) => "float32",
            Tensor::F64(_) => "float64",
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_tensor!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Length of the leading axis (0 for a zero-dimensional value).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the trailing axis, i.e. the number of rows of `self.T`.
    pub fn last_axis_len(&self) -> Option<usize> {
        self.shape().last().copied()
    }

    /// Rows `range` along the leading axis, or `None` if the range does not fit.
    pub fn slice_rows(&self, range: Range<usize>) -> Option<Tensor> {
        if self.ndim() == 0 || range.start > range.end || range.end > self.len() {
            return None;
        }
        let slice = Slice::from(range);
        Some(map_tensor!(self, a => a.slice_axis(Axis(0), slice).to_owned()))
    }

    /// The `index`-th entry along the leading axis.
    pub fn row(&self, index: usize) -> Option<Tensor> {
        if self.ndim() == 0 || index >= self.len() {
            return None;
        }
        Some(map_tensor!(self, a => a.index_axis(Axis(0), index).to_owned()))
    }

    /// The `index`-th row of the transposed array (numpy `a.T[index]`).
    ///
    /// Indexes the trailing axis and reverses the order of the remaining ones,
    /// so a `(steps, k)` matrix yields the `steps`-long column `index`.
    pub fn transposed_row(&self, index: usize) -> Option<Tensor> {
        let last = self.last_axis_len()?;
        if index >= last {
            return None;
        }
        Some(map_tensor!(self, a => a
            .view()
            .reversed_axes()
            .index_axis(Axis(0), index)
            .to_owned()))
    }

    /// Every element converted to `f32`, in logical order.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Tensor::Bool(a) => a.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            Tensor::U8(a) => a.iter().map(|&v| v as f32).collect(),
            Tensor::I32(a) => a.iter().map(|&v| v as f32).collect(),
            Tensor::I64(a) => a.iter().map(|&v| v as f32).collect(),
            Tensor::F32(a) => a.iter().copied().collect(),
            Tensor::F64(a) => a.iter().map(|&v| v as f32).collect(),
        }
    }

    /// Stack decoded frames into one `(n, height, width, 3)` tensor.
    ///
    /// Returns `None` when the frames disagree on their dimensions.
    pub fn from_frames(frames: &[Frame]) -> Option<Tensor> {
        if frames.is_empty() {
            return Some(Tensor::U8(ArrayD::zeros(IxDyn(&[0, 0, 0, 3]))));
        }
        let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
        let stacked = ndarray::stack(Axis(0), &views).ok()?;
        Some(Tensor::U8(stacked.into_dyn()))
    }

    pub fn describe(&self) -> FieldShape {
        FieldShape {
            dtype: self.dtype().to_string(),
            shape: self.shape().to_vec(),
        }
    }
}

/// Element type and shape of a tensor, for summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldShape {
    pub dtype: String,
    pub shape: Vec<usize>,
}

impl From<ArrayD<f32>> for Tensor {
    fn from(a: ArrayD<f32>) -> Self {
        Tensor::F32(a)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(a: ArrayD<i64>) -> Self {
        Tensor::I64(a)
    }
}

impl From<ArrayD<u8>> for Tensor {
    fn from(a: ArrayD<u8>) -> Self {
        Tensor::U8(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn test_leading_length_and_slices() {
        let t = Tensor::from(arr2(&[[1i64, 2], [3, 4], [5, 6]]).into_dyn());
        assert_eq!(t.len(), 3);
        assert_eq!(t.shape(), &[3, 2]);

        let head = t.slice_rows(0..2).unwrap();
        assert_eq!(head, Tensor::from(arr2(&[[1i64, 2], [3, 4]]).into_dyn()));
        let tail = t.slice_rows(1..3).unwrap();
        assert_eq!(tail, Tensor::from(arr2(&[[3i64, 4], [5, 6]]).into_dyn()));
        assert!(t.slice_rows(1..4).is_none());
    }

    #[test]
    fn test_transposed_row_picks_column() {
        let t = Tensor::from(arr2(&[[1i64, 2], [3, 4], [5, 6]]).into_dyn());
        assert_eq!(
            t.transposed_row(1).unwrap(),
            Tensor::from(arr1(&[2i64, 4, 6]).into_dyn())
        );
        assert!(t.transposed_row(2).is_none());
    }

    #[test]
    fn test_transposed_row_of_vector_is_scalar() {
        let t = Tensor::from(arr1(&[7.5f32]).into_dyn());
        let first = t.transposed_row(0).unwrap();
        assert_eq!(first.ndim(), 0);
        assert_eq!(first.to_f32_vec(), vec![7.5]);
    }

    #[test]
    fn test_zero_dimensional_has_no_rows() {
        let t = Tensor::from(ArrayD::<f32>::from_elem(IxDyn(&[]), 1.0));
        assert_eq!(t.len(), 0);
        assert!(t.row(0).is_none());
        assert!(t.transposed_row(0).is_none());
    }

    #[test]
    fn test_stack_frames() {
        let frames = vec![
            Array3::<u8>::from_elem((2, 3, 3), 1),
            Array3::<u8>::from_elem((2, 3, 3), 2),
        ];
        let stacked = Tensor::from_frames(&frames).unwrap();
        assert_eq!(stacked.shape(), &[2, 2, 3, 3]);
        assert_eq!(stacked.dtype(), "uint8");

        let mismatched = vec![
            Array3::<u8>::zeros((2, 3, 3)),
            Array3::<u8>::zeros((4, 3, 3)),
        ];
        assert!(Tensor::from_frames(&mismatched).is_none());
    }

    #[test]
    fn test_reward_conversion() {
        let t = Tensor::F64(arr1(&[0.0f64, 1.0, 64.0]).into_dyn());
        assert_eq!(t.to_f32_vec(), vec![0.0, 1.0, 64.0]);
    }
}
