//! Position of a cursor inside one tree
use crate::grid::HyperTree;
use crate::traits::{TreeAccess, TreeAccessMut};

/// The local index of a node, with the navigation and queries cursors are built from.
///
/// An entry does not borrow its tree. Every operation is handed the tree access it needs, so
/// a stack of entries can be copied and unwound freely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HyperTreeGridEntry {
    index: usize,
}

impl HyperTreeGridEntry {
    /// Entry at node `index`.
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Entry at the root of a tree.
    pub fn root() -> Self {
        Self { index: 0 }
    }

    /// Local index of the node.
    pub fn vertex_id(&self) -> usize {
        self.index
    }

    /// Global index of the node.
    pub fn global_node_index(&self, tree: &HyperTree) -> usize {
        tree.global_index_from_local(self.index)
    }

    /// Number the nodes of `tree` from `start`.
    pub fn set_global_index_start(&self, tree: &mut HyperTree, start: usize) {
        tree.set_global_index_start(start);
    }

    /// Give the node an explicit global index.
    pub fn set_global_index_from_local(&self, tree: &mut HyperTree, global: usize) {
        tree.set_global_index_from_local(self.index, global);
    }

    /// Whether the node has no children, or `level` is at the depth limiter.
    pub fn is_leaf<V: TreeAccess>(&self, access: &V, level: usize) -> bool {
        if access.depth_limiter().is_some_and(|limit| level >= limit) {
            return true;
        }
        access.tree().is_leaf(self.index)
    }

    /// Whether the node is masked, always false for grids without a mask.
    pub fn is_masked<V: TreeAccess>(&self, access: &V) -> bool {
        match access.mask() {
            Some(mask) => mask.get(self.global_node_index(access.tree())),
            None => false,
        }
    }

    /// Set the mask bit of the node.
    pub fn set_mask<V: TreeAccessMut>(&self, access: &mut V, state: bool) {
        let global = self.global_node_index(access.tree());
        match access.mask_mut() {
            Some(mask) => mask.set(global, state),
            None => assert!(!state, "Cannot mask node {global} of a grid without a mask"),
        }
    }

    /// Refine the leaf at `level` into a coarse node.
    pub fn subdivide_leaf<V: TreeAccessMut>(&self, access: &mut V, level: usize) {
        assert!(!self.is_masked(access), "Cannot subdivide a masked node");
        assert!(
            access.tree().is_leaf(self.index),
            "Cannot subdivide a coarse node"
        );
        access.tree_mut().subdivide_leaf(self.index, level);
    }

    /// Move to child `ichild` of the coarse node at `level`.
    pub fn to_child<V: TreeAccess>(&mut self, access: &V, level: usize, ichild: usize) {
        assert!(!self.is_leaf(access, level), "Cannot descend from a leaf");
        assert!(!self.is_masked(access), "Cannot descend from a masked node");
        self.index = access.tree().child_index(self.index, ichild);
    }
}
