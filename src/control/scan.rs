use super::LoopError;
use crate::{
    layout::Layout,
    tensor::TensorError,
    workspace::{SlotId, Workspace},
};

/// Capacity multiplier applied when a scan buffer outgrows its allocation.
const GROWTH: f64 = 2.0;

/// Stacks one slice per executed iteration into a growing buffer.
///
/// The first appended slice fixes the per-iteration shape and element type;
/// every later slice must match exactly. The target buffer's leading dimension
/// equals the number of slices appended so far, while its allocation grows
/// geometrically, so n appends cost O(n) total copying and O(log n)
/// reallocations. Slice `i` occupies the byte range
/// `i * row .. (i + 1) * row` of the contiguous storage.
#[derive(Debug, Clone)]
pub struct ScanAccumulator {
    /// Scan output position within the operator, for error reporting.
    index: usize,
    /// Operator output slot receiving the stacked buffer.
    target: SlotId,
    /// Per-iteration shape, captured from the first appended slice.
    shape: Option<Layout>,
    /// Reallocations performed by appends so far.
    reallocations: usize,
}

impl ScanAccumulator {
    pub fn new(index: usize, target: SlotId) -> Self {
        Self {
            index,
            target,
            shape: None,
            reallocations: 0,
        }
    }

    /// Reset the target to leading dimension 0. The per-iteration shape is
    /// re-captured on the next append; previously allocated capacity is kept.
    pub fn reset(&mut self, ws: &mut Workspace) {
        self.shape = None;
        ws.get_mut(self.target).clear();
    }

    /// Append the slice held in `source` as row `iteration` of the target.
    pub fn append(
        &mut self,
        ws: &mut Workspace,
        source: SlotId,
        iteration: i64,
    ) -> Result<(), LoopError> {
        let (slice, target) = ws.pair_mut(source, self.target);
        match &self.shape {
            None => {
                let shape = slice.layout();
                target.resize(slice.data_type(), shape.prepend(1));
                target.bytes_mut().copy_from_slice(slice.bytes());
                self.shape = Some(shape);
            }
            Some(shape) => {
                if slice.layout() != *shape {
                    return Err(LoopError::ShapeMismatch {
                        index: self.index,
                        iteration,
                        expected: shape.clone(),
                        actual: slice.layout(),
                    });
                }
                if slice.data_type() != target.data_type() {
                    return Err(TensorError::Type(slice.data_type(), target.data_type()).into());
                }
                if target.extend(GROWTH) {
                    self.reallocations += 1;
                }
                let row = slice.data_size();
                let offset = iteration as usize * row;
                target.bytes_mut()[offset..offset + row].copy_from_slice(slice.bytes());
            }
        }
        Ok(())
    }

    /// Number of buffer reallocations performed by appends so far.
    #[inline]
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }
}
