//! Access to a tree and the grid state a cursor needs
use crate::grid::{BitArray, HyperTree};

/// Read access to a tree, the grid mask and the grid's depth limiter.
pub trait TreeAccess {
    /// The tree being traversed.
    fn tree(&self) -> &HyperTree;

    /// The mask of the grid, if it has one.
    fn mask(&self) -> Option<&BitArray>;

    /// Level at which nodes are treated as leaves, if any.
    fn depth_limiter(&self) -> Option<usize>;

    /// Direction masks of the children of a coarse node.
    fn child_masks(&self) -> &[u32];
}

/// Write access to a tree and the grid mask.
pub trait TreeAccessMut: TreeAccess {
    /// The tree being traversed.
    fn tree_mut(&mut self) -> &mut HyperTree;

    /// The mask of the grid, if it has one.
    fn mask_mut(&mut self) -> Option<&mut BitArray>;
}
