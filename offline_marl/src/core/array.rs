//! Typed host arrays for timestep fields.
//!
//! Every field of a timestep (observations, actions, rewards, ...) is a dense
//! row-major array with one of three element types. The replay buffer never
//! interprets values; it only needs the dtype and shape to preallocate
//! storage and to validate that later writes agree with the first one.
//!
//! Arrays convert into `burn::tensor::TensorData`, which is how sampled
//! batches reach a training backend:
//!
//! ```ignore
//! let data = experience.rewards.to_tensor_data();
//! let rewards = Tensor::<B, 3>::from_data(data, &device);
//! ```

use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element type of an [`Array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    I64,
    Bool,
}

impl DType {
    /// Size of one element in the on-disk representation.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I64 => 8,
            DType::Bool => 1,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::I64 => write!(f, "i64"),
            DType::Bool => write!(f, "bool"),
        }
    }
}

/// Errors raised while constructing arrays.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArrayError {
    #[error("shape {shape:?} holds {expected} elements but {actual} were given")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

/// Flat element storage, tagged by element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    F32(Vec<f32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl ArrayData {
    /// Zero-filled storage of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => ArrayData::F32(vec![0.0; len]),
            DType::I64 => ArrayData::I64(vec![0; len]),
            DType::Bool => ArrayData::Bool(vec![false; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src[src_range]` into `self[dst_start..]`.
    ///
    /// Both sides must share a dtype; callers check this up front, so a
    /// mismatch here is a logic error and panics.
    pub(crate) fn copy_range_from(
        &mut self,
        dst_start: usize,
        src: &ArrayData,
        src_range: std::ops::Range<usize>,
    ) {
        let n = src_range.len();
        match (self, src) {
            (ArrayData::F32(dst), ArrayData::F32(src)) => {
                dst[dst_start..dst_start + n].copy_from_slice(&src[src_range])
            }
            (ArrayData::I64(dst), ArrayData::I64(src)) => {
                dst[dst_start..dst_start + n].copy_from_slice(&src[src_range])
            }
            (ArrayData::Bool(dst), ArrayData::Bool(src)) => {
                dst[dst_start..dst_start + n].copy_from_slice(&src[src_range])
            }
            (dst, src) => unreachable!(
                "dtype checked before copy: {} <- {}",
                dst.dtype(),
                src.dtype()
            ),
        }
    }

    /// Append `src[range]` to the end of `self`.
    pub(crate) fn extend_from_range(&mut self, src: &ArrayData, range: std::ops::Range<usize>) {
        match (self, src) {
            (ArrayData::F32(dst), ArrayData::F32(src)) => dst.extend_from_slice(&src[range]),
            (ArrayData::I64(dst), ArrayData::I64(src)) => dst.extend_from_slice(&src[range]),
            (ArrayData::Bool(dst), ArrayData::Bool(src)) => dst.extend_from_slice(&src[range]),
            (dst, src) => unreachable!(
                "dtype checked before copy: {} <- {}",
                dst.dtype(),
                src.dtype()
            ),
        }
    }

    /// Empty storage with room for `capacity` elements.
    pub(crate) fn with_capacity(dtype: DType, capacity: usize) -> Self {
        match dtype {
            DType::F32 => ArrayData::F32(Vec::with_capacity(capacity)),
            DType::I64 => ArrayData::I64(Vec::with_capacity(capacity)),
            DType::Bool => ArrayData::Bool(Vec::with_capacity(capacity)),
        }
    }
}

/// Dense row-major array with an explicit shape.
///
/// A rank-0 array (empty shape) holds exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

impl Array {
    /// Build an array, checking that `shape` accounts for every element.
    pub fn new(shape: impl Into<Vec<usize>>, data: ArrayData) -> Result<Self, ArrayError> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ArrayError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: impl Into<Vec<usize>>, data: Vec<f32>) -> Result<Self, ArrayError> {
        Self::new(shape, ArrayData::F32(data))
    }

    pub fn from_i64(shape: impl Into<Vec<usize>>, data: Vec<i64>) -> Result<Self, ArrayError> {
        Self::new(shape, ArrayData::I64(data))
    }

    pub fn from_bool(shape: impl Into<Vec<usize>>, data: Vec<bool>) -> Result<Self, ArrayError> {
        Self::new(shape, ArrayData::Bool(data))
    }

    /// Rank-1 array from a vector (one entry per agent, typically).
    pub fn vector_f32(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data: ArrayData::F32(data),
        }
    }

    pub fn vector_i64(data: Vec<i64>) -> Self {
        Self {
            shape: vec![data.len()],
            data: ArrayData::I64(data),
        }
    }

    pub fn vector_bool(data: Vec<bool>) -> Self {
        Self {
            shape: vec![data.len()],
            data: ArrayData::Bool(data),
        }
    }

    pub fn scalar_f32(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: ArrayData::F32(vec![value]),
        }
    }

    /// Zero-filled array.
    pub fn zeros(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: ArrayData::zeros(dtype, len),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            ArrayData::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            ArrayData::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Values widened to `f32` regardless of dtype (bools map to 0/1).
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.data {
            ArrayData::F32(v) => v.clone(),
            ArrayData::I64(v) => v.iter().map(|&x| x as f32).collect(),
            ArrayData::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Same data viewed with a new shape of equal element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self, ArrayError> {
        Self::new(shape, self.data)
    }

    /// Convert into burn's backend-agnostic tensor payload.
    pub fn to_tensor_data(&self) -> TensorData {
        let shape = self.shape.clone();
        match &self.data {
            ArrayData::F32(v) => TensorData::new(v.clone(), shape),
            ArrayData::I64(v) => TensorData::new(v.clone(), shape),
            ArrayData::Bool(v) => TensorData::new(v.clone(), shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let err = Array::from_f32([2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            ArrayError::ShapeMismatch {
                shape: vec![2, 3],
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn test_scalar_has_one_element() {
        let a = Array::scalar_f32(3.5);
        assert_eq!(a.rank(), 0);
        assert_eq!(a.len(), 1);
        assert_eq!(a.as_f32(), Some(&[3.5][..]));
    }

    #[test]
    fn test_to_f32_vec_widens() {
        let b = Array::vector_bool(vec![true, false, true]);
        assert_eq!(b.to_f32_vec(), vec![1.0, 0.0, 1.0]);

        let i = Array::vector_i64(vec![-2, 7]);
        assert_eq!(i.to_f32_vec(), vec![-2.0, 7.0]);
    }

    #[test]
    fn test_reshape_keeps_data() {
        let a = Array::from_i64([6], (0..6).collect()).unwrap();
        let b = a.reshape([1, 2, 3]).unwrap();
        assert_eq!(b.shape(), &[1, 2, 3]);
        assert_eq!(b.as_i64().unwrap(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_to_tensor_data_shape_and_values() {
        let a = Array::from_f32([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let data = a.to_tensor_data();
        assert_eq!(data.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        let device = Default::default();
        let tensor = Tensor::<NdArray<f32>, 2>::from_data(data, &device);
        assert_eq!(tensor.dims(), [2, 2]);
    }

    #[test]
    fn test_zeros_matches_dtype() {
        let a = Array::zeros([3, 2], DType::I64);
        assert_eq!(a.dtype(), DType::I64);
        assert_eq!(a.as_i64().unwrap(), &[0; 6]);
    }
}
