use bytemuck::Pod;
use derive_more::Display;
use half::f16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    #[default]
    F32,
    F16,
    I32,
    I64,
    U8,
    Bool,
}

impl DataType {
    /// Returns the size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F16 => 2,
            DataType::I32 => 4,
            DataType::I64 => 8,
            DataType::U8 => 1,
            DataType::Bool => 1,
        }
    }
}

/// Element types that can live in a tensor value.
///
/// Booleans have no [`Scalar`] impl; they are stored as single bytes under
/// [`DataType::Bool`] and accessed through the dedicated tensor accessors.
pub trait Scalar: Sized + Pod + Send + Sync {
    const DATA_TYPE: DataType;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for i32 {
    const DATA_TYPE: DataType = DataType::I32;
}

impl Scalar for i64 {
    const DATA_TYPE: DataType = DataType::I64;
}

impl Scalar for u8 {
    const DATA_TYPE: DataType = DataType::U8;
}
