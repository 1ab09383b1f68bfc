//! Generation-checked node handles.
//!
//! Slots are recycled through a free list; the generation counter makes a
//! handle to a destroyed node fail resolution instead of aliasing whatever
//! now occupies the slot.

use serde::{Deserialize, Serialize};

/// Opaque id of a node in the evaluation graph arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeHandle {
    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        NodeHandle { index, generation }
    }

    /// Arena slot index. Only meaningful to the owning graph.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}
