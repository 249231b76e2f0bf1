use std::sync::Arc;

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use crate::tensor::TensorValue;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace slot error: no slot bound to name {0}")]
    Name(Arc<str>),
}

/// A stable, non-owning handle to a workspace slot.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("slot_{_0}")]
pub struct SlotId(usize);

/// An owning table of named tensor slots.
///
/// Slots are never removed, so a [`SlotId`] stays valid for the workspace's
/// lifetime and always addresses the same storage. Collaborators that must
/// observe a value through the same storage identity across invocations hold
/// the handle, not the value.
#[derive(Debug, Default)]
pub struct Workspace {
    names: HashMap<Arc<str>, SlotId>,
    slots: Vec<TensorValue>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a slot, creating an empty one if none exists yet.
    /// Binding the same name again returns the same handle.
    pub fn bind(&mut self, name: &str) -> SlotId {
        match self.names.get(name) {
            Some(&id) => id,
            None => {
                let id = SlotId(self.slots.len());
                self.slots.push(TensorValue::default());
                self.names.insert(name.into(), id);
                id
            }
        }
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<SlotId> {
        self.names.get(name).copied()
    }

    #[inline]
    pub fn get(&self, id: SlotId) -> &TensorValue {
        &self.slots[id.0]
    }

    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> &mut TensorValue {
        &mut self.slots[id.0]
    }

    /// The value bound to `name`.
    pub fn fetch(&self, name: &str) -> Result<&TensorValue, WorkspaceError> {
        self.lookup(name)
            .map(|id| self.get(id))
            .ok_or_else(|| WorkspaceError::Name(name.into()))
    }

    /// The value bound to `name`, mutable.
    pub fn fetch_mut(&mut self, name: &str) -> Result<&mut TensorValue, WorkspaceError> {
        match self.lookup(name) {
            Some(id) => Ok(self.get_mut(id)),
            None => Err(WorkspaceError::Name(name.into())),
        }
    }

    /// Disjoint mutable access to two distinct slots.
    ///
    /// # Panics
    /// Panics if both handles address the same slot.
    pub fn pair_mut(&mut self, a: SlotId, b: SlotId) -> (&mut TensorValue, &mut TensorValue) {
        assert_ne!(a, b, "pair_mut requires distinct slots");
        if a.0 < b.0 {
            let (lo, hi) = self.slots.split_at_mut(b.0);
            (&mut lo[a.0], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(a.0);
            (&mut hi[0], &mut lo[b.0])
        }
    }

    /// Copy the contents of slot `src` into slot `dst`.
    /// Copying a slot onto itself is a no-op.
    pub fn copy(&mut self, src: SlotId, dst: SlotId) {
        if src == dst {
            return;
        }
        let (src, dst) = self.pair_mut(src, dst);
        dst.copy_from(src);
    }
}
