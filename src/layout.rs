use derive_more::{Deref, Display, From, Into};
use itertools::Itertools;

/// The shape of a tensor value, leading dimension first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, From, Into, Display)]
#[display("[{}]", _0.iter().format(", "))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout(Vec<usize>);

impl Layout {
    #[inline]
    pub fn from_shape(shape: impl IntoLayout) -> Self {
        shape.into_layout()
    }

    /// Total number of elements, the product of all dimensions.
    #[inline]
    pub fn size(&self) -> usize {
        self.iter().product()
    }

    /// A new layout with `dim` inserted in front: `[dim, *self]`.
    #[inline]
    pub fn prepend(&self, dim: usize) -> Self {
        let mut shape = Vec::with_capacity(self.len() + 1);
        shape.push(dim);
        shape.extend_from_slice(self);
        Self(shape)
    }
}

pub trait IntoLayout {
    fn into_layout(self) -> Layout;
}

impl IntoLayout for Layout {
    #[inline]
    fn into_layout(self) -> Layout {
        self
    }
}

impl IntoLayout for Vec<usize> {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout(self)
    }
}

impl IntoLayout for &[usize] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout(self.to_vec())
    }
}

impl<const N: usize> IntoLayout for [usize; N] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout(self.to_vec())
    }
}
