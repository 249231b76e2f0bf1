use thiserror::Error;

use crate::{
    layout::{IntoLayout, Layout},
    num::{DataType, Scalar},
};

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("tensor type error: data type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("tensor creation error: layout {0}'s size not match data len {1}")]
    Create(Layout, usize),
    #[error("tensor scalar error: layout {0} does not hold exactly one element")]
    Scalar(Layout),
}

/// An owned tensor value: a layout, an element type, and contiguous bytes.
///
/// The byte length always equals `layout.size() * type.size()`; the underlying
/// allocation may hold extra capacity left behind by [`TensorValue::extend`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorValue {
    layout: Layout,
    r#type: DataType,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    data: Vec<u8>,
}

impl Default for TensorValue {
    fn default() -> Self {
        Self {
            layout: Layout::from_shape([0]),
            r#type: DataType::default(),
            data: Vec::new(),
        }
    }
}

impl TensorValue {
    /// Create a value from typed contents. Returns error if the layout's size
    /// does not match the number of elements.
    pub fn from_data<T: Scalar>(
        layout: impl IntoLayout,
        contents: impl AsRef<[T]>,
    ) -> Result<Self, TensorError> {
        let layout = layout.into_layout();
        let contents = contents.as_ref();
        if layout.size() != contents.len() {
            return Err(TensorError::Create(layout, contents.len()));
        }
        let data = bytemuck::cast_slice(contents).to_vec();
        Ok(Self {
            layout,
            r#type: T::DATA_TYPE,
            data,
        })
    }

    /// A scalar value holding a single element.
    pub fn scalar<T: Scalar>(value: T) -> Self {
        let mut tensor = Self::default();
        tensor.set_scalar(value);
        tensor
    }

    /// A scalar boolean value, stored as a single [`DataType::Bool`] byte.
    pub fn scalar_bool(value: bool) -> Self {
        let mut tensor = Self::default();
        tensor.set_bool(value);
        tensor
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout.clone()
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.layout.size() * self.r#type.size()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read the contents as a typed vector. Returns error if type mismatches.
    pub fn to_vec<T: Scalar>(&self) -> Result<Vec<T>, TensorError> {
        if self.r#type != T::DATA_TYPE {
            return Err(TensorError::Type(self.r#type, T::DATA_TYPE));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    /// Read a single-element value.
    pub fn scalar_value<T: Scalar>(&self) -> Result<T, TensorError> {
        if self.r#type != T::DATA_TYPE {
            return Err(TensorError::Type(self.r#type, T::DATA_TYPE));
        }
        if self.layout.size() != 1 {
            return Err(TensorError::Scalar(self.layout()));
        }
        Ok(bytemuck::pod_read_unaligned(&self.data))
    }

    /// Read a single-element boolean value.
    pub fn bool_value(&self) -> Result<bool, TensorError> {
        if self.r#type != DataType::Bool {
            return Err(TensorError::Type(self.r#type, DataType::Bool));
        }
        if self.layout.size() != 1 {
            return Err(TensorError::Scalar(self.layout()));
        }
        Ok(self.data[0] != 0)
    }

    /// Overwrite with a single element, reusing the allocation.
    pub fn set_scalar<T: Scalar>(&mut self, value: T) {
        self.layout = Layout::from_shape([1]);
        self.r#type = T::DATA_TYPE;
        self.data.clear();
        self.data.extend_from_slice(bytemuck::bytes_of(&value));
    }

    /// Overwrite with a single boolean, reusing the allocation.
    pub fn set_bool(&mut self, value: bool) {
        self.layout = Layout::from_shape([1]);
        self.r#type = DataType::Bool;
        self.data.clear();
        self.data.push(value as u8);
    }

    /// Copy contents from another value, adopting its layout and type.
    /// Reuses the allocation; never aliases the source.
    pub fn copy_from(&mut self, other: &TensorValue) {
        self.layout = other.layout.clone();
        self.r#type = other.r#type;
        self.data.clear();
        self.data.extend_from_slice(&other.data);
    }

    /// Resize to a new type and layout, zero-filling. Prior contents are discarded.
    pub fn resize(&mut self, r#type: DataType, layout: impl IntoLayout) {
        self.layout = layout.into_layout();
        self.r#type = r#type;
        let size = self.data_size();
        self.data.clear();
        self.data.resize(size, 0);
    }

    /// Reset to leading dimension 0, retaining the allocation and element type.
    pub fn clear(&mut self) {
        self.layout = Layout::from_shape([0]);
        self.data.clear();
    }

    /// Grow the leading dimension by one row, zero-filling the new row.
    ///
    /// When the allocation is exhausted, its capacity is multiplied by `growth`
    /// (never less than one extra row), so repeated extension reallocates
    /// O(log n) times over n rows. Returns `true` if a reallocation happened.
    pub fn extend(&mut self, growth: f64) -> bool {
        let mut shape: Vec<usize> = self.layout.to_vec();
        assert!(!shape.is_empty(), "extend requires a leading dimension");
        shape[0] += 1;
        let len = shape.iter().product::<usize>() * self.r#type.size();

        let grown = len > self.data.capacity();
        if grown {
            let target = ((self.data.capacity() as f64 * growth).ceil() as usize).max(len);
            self.data.reserve_exact(target - self.data.len());
        }
        self.data.resize(len, 0);
        self.layout = Layout::from(shape);
        grown
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::{TensorError, TensorValue};
    use crate::{layout::Layout, num::DataType};

    #[test]
    fn test_scalar_round_trip() {
        let tensor = TensorValue::scalar(42i64);
        assert_eq!(tensor.layout(), Layout::from_shape([1]));
        assert_eq!(tensor.data_type(), DataType::I64);
        assert_eq!(tensor.scalar_value::<i64>().unwrap(), 42);

        let tensor = TensorValue::scalar_bool(true);
        assert!(tensor.bool_value().unwrap());
        assert!(matches!(
            tensor.scalar_value::<f32>(),
            Err(TensorError::Type(DataType::Bool, DataType::F32))
        ));
    }

    #[test]
    fn test_from_data() {
        let tensor = TensorValue::from_data([2, 2], [1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(tensor.data_size(), 16);
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        assert!(matches!(
            TensorValue::from_data([3], [f16::ONE]),
            Err(TensorError::Create(_, 1))
        ));
    }

    #[test]
    fn test_copy_from() {
        let source = TensorValue::from_data([3], [1u8, 2, 3]).unwrap();
        let mut target = TensorValue::scalar(0.0f32);
        target.copy_from(&source);
        assert_eq!(target, source);
        assert_ne!(target.bytes().as_ptr(), source.bytes().as_ptr());
    }

    #[test]
    fn test_extend_growth() {
        let mut tensor = TensorValue::from_data([1, 4], [0u8, 1, 2, 3]).unwrap();
        let mut reallocations = 0;
        for _ in 0..1024 {
            if tensor.extend(2.0) {
                reallocations += 1;
            }
        }
        assert_eq!(tensor.layout(), Layout::from_shape([1025, 4]));
        assert_eq!(tensor.bytes().len(), 4100);
        // doubling from 4 bytes to over 4100 takes ~10 steps
        assert!(reallocations <= 12, "reallocated {reallocations} times");
        // the first row and the zero fill survive
        assert_eq!(&tensor.bytes()[..8], &[0, 1, 2, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn test_clear_retains_capacity() {
        let mut tensor = TensorValue::from_data([8, 4], vec![7u8; 32]).unwrap();
        tensor.clear();
        assert_eq!(tensor.layout(), Layout::from_shape([0]));
        assert_eq!(tensor.data_size(), 0);
        assert_eq!(tensor.data_type(), DataType::U8);
        assert!(tensor.data.capacity() >= 32);
    }
}
