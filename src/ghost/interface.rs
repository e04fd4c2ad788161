//! Serialisation of the part of a tree that touches a neighbour
use crate::cursor::HyperTreeGridNonOrientedCursor;
use crate::grid::BitArray;
use crate::traits::{TreeAccess, TreeAccessMut};
use crate::types::{Error, Result};

/// The interface of one tree facing one neighbour, in depth-first pre-order.
///
/// Every emitted node contributes one refinement bit, one mask bit if the grid is masked, and
/// its local index in the source tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeInterface {
    is_parent: BitArray,
    is_masked: Option<BitArray>,
    indices: Vec<usize>,
}

impl TreeInterface {
    /// An empty interface, recording mask bits if `masked` is set.
    pub fn new(masked: bool) -> Self {
        Self {
            is_parent: BitArray::new(),
            is_masked: masked.then(BitArray::new),
            indices: Vec::new(),
        }
    }

    /// Number of emitted nodes.
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    /// Refinement bit of every emitted node.
    pub fn is_parent(&self) -> &BitArray {
        &self.is_parent
    }

    /// Mask bit of every emitted node, if the grid is masked.
    pub fn is_masked(&self) -> Option<&BitArray> {
        self.is_masked.as_ref()
    }

    /// Local index of every emitted node.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    fn record(&mut self, is_parent: bool, is_masked: bool, index: usize) {
        self.is_parent.push(is_parent);
        if let Some(mask) = self.is_masked.as_mut() {
            mask.push(is_masked);
        }
        self.indices.push(index);
    }
}

/// Append the nodes under the cursor that lie against the directions in `mask`.
///
/// A coarse node is descended into child by child. A child whose own direction mask does not
/// intersect `mask` is still emitted, as a leaf, so that the receiver can rebuild the complete
/// set of siblings; its subtree is skipped.
pub fn extract_interface<V: TreeAccess>(
    cursor: &mut HyperTreeGridNonOrientedCursor<V>,
    interface: &mut TreeInterface,
    mask: u32,
) {
    let is_masked = cursor.is_masked();
    let is_parent = !cursor.is_leaf() && !is_masked;
    interface.record(is_parent, is_masked, cursor.vertex_id());
    if !is_parent {
        return;
    }
    for ichild in 0..cursor.number_of_children() {
        let child_mask = mask & cursor.child_masks()[ichild];
        cursor.to_child(ichild);
        if child_mask != 0 {
            extract_interface(cursor, interface, child_mask);
        } else {
            interface.record(false, cursor.is_masked(), cursor.vertex_id());
        }
        cursor.to_parent();
    }
}

/// Rebuild a tree from streams written by [extract_interface], starting at the cursor.
///
/// The global index of every rebuilt node is appended to `indices` in stream order, and
/// `position` is advanced past the consumed bits.
pub fn reconstruct_interface<V: TreeAccessMut>(
    cursor: &mut HyperTreeGridNonOrientedCursor<V>,
    is_parent: &BitArray,
    is_masked: Option<&BitArray>,
    indices: &mut Vec<usize>,
    position: &mut usize,
) -> Result<()> {
    let corrupt = |reason: String| Error::CorruptStream {
        tree: cursor.tree_index(),
        reason,
    };
    let current = *position;
    if current >= is_parent.len() {
        return Err(corrupt(format!(
            "stream ends after {} nodes",
            is_parent.len()
        )));
    }
    *position += 1;
    indices.push(cursor.global_node_index());

    if let Some(masked) = is_masked {
        if masked.get(current) {
            if cursor.access().mask().is_none() {
                return Err(corrupt("masked node in a grid without a mask".into()));
            }
            cursor.set_mask(true);
            return Ok(());
        }
    }
    if !is_parent.get(current) {
        return Ok(());
    }
    if cursor
        .access()
        .depth_limiter()
        .is_some_and(|limit| cursor.level() >= limit)
    {
        return Err(corrupt(format!(
            "refined node below the depth limiter at level {}",
            cursor.level()
        )));
    }

    cursor.subdivide_leaf();
    for ichild in 0..cursor.number_of_children() {
        cursor.to_child(ichild);
        reconstruct_interface(cursor, is_parent, is_masked, indices, position)?;
        cursor.to_parent();
    }
    Ok(())
}
