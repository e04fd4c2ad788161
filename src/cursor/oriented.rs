//! Descend-only cursor
use crate::cursor::HyperTreeGridEntry;
use crate::grid::HyperTree;
use crate::traits::{TreeAccess, TreeAccessMut};

/// A cursor holding a single entry.
///
/// Moving to a child forgets the parent, which suits top-down recursions that pass the cursor
/// by value (clone it before descending to keep the parent).
#[derive(Clone, Debug)]
pub struct HyperTreeGridOrientedCursor<V> {
    access: V,
    entry: HyperTreeGridEntry,
    level: usize,
}

impl<V: TreeAccess> HyperTreeGridOrientedCursor<V> {
    /// Cursor at the root of the tree behind `access`.
    pub fn new(access: V) -> Self {
        Self {
            access,
            entry: HyperTreeGridEntry::root(),
            level: 0,
        }
    }

    /// The tree access of the cursor.
    pub fn access(&self) -> &V {
        &self.access
    }

    /// The tree being traversed.
    pub fn tree(&self) -> &HyperTree {
        self.access.tree()
    }

    /// Index of the tree in the lattice.
    pub fn tree_index(&self) -> usize {
        self.access.tree().tree_index()
    }

    /// The current entry.
    pub fn entry(&self) -> &HyperTreeGridEntry {
        &self.entry
    }

    /// Local index of the current node.
    pub fn vertex_id(&self) -> usize {
        self.entry.vertex_id()
    }

    /// Global index of the current node.
    pub fn global_node_index(&self) -> usize {
        self.entry.global_node_index(self.access.tree())
    }

    /// Number of children of a coarse node.
    pub fn number_of_children(&self) -> usize {
        self.access.tree().number_of_children()
    }

    /// Whether the current node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.entry.is_leaf(&self.access, self.level)
    }

    /// Whether the current node is masked.
    pub fn is_masked(&self) -> bool {
        self.entry.is_masked(&self.access)
    }

    /// Whether the cursor is at the root of the tree.
    pub fn is_root(&self) -> bool {
        self.entry.vertex_id() == 0
    }

    /// Level of the current node, the root being at level 0.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Move to child `ichild`.
    pub fn to_child(&mut self, ichild: usize) {
        self.entry.to_child(&self.access, self.level, ichild);
        self.level += 1;
    }
}

impl<V: TreeAccessMut> HyperTreeGridOrientedCursor<V> {
    /// Set the mask bit of the current node.
    pub fn set_mask(&mut self, state: bool) {
        self.entry.set_mask(&mut self.access, state);
    }

    /// Refine the current leaf.
    pub fn subdivide_leaf(&mut self) {
        self.entry.subdivide_leaf(&mut self.access, self.level);
    }

    /// Number the nodes of the tree from `start`.
    pub fn set_global_index_start(&mut self, start: usize) {
        self.entry
            .set_global_index_start(self.access.tree_mut(), start);
    }

    /// Give the current node an explicit global index.
    pub fn set_global_index_from_local(&mut self, global: usize) {
        self.entry
            .set_global_index_from_local(self.access.tree_mut(), global);
    }
}

#[cfg(test)]
mod test {
    use crate::grid::HyperTreeGrid;

    #[test]
    fn test_build_and_walk() {
        let mut grid = HyperTreeGrid::new(2, 2, [2, 2, 1]).unwrap();
        {
            let mut cursor = grid.oriented_cursor_mut(3, true).unwrap();
            cursor.set_global_index_start(7);
            cursor.subdivide_leaf();
            cursor.to_child(3);
            cursor.subdivide_leaf();
            assert_eq!(cursor.level(), 1);
            assert!(!cursor.is_root());
        }

        let cursor = grid.oriented_cursor(3).unwrap();
        assert!(cursor.is_root());
        assert!(!cursor.is_leaf());
        assert_eq!(cursor.global_node_index(), 7);

        // Cloning keeps the parent while the copy descends
        let mut child = cursor.clone();
        child.to_child(3);
        assert_eq!(child.vertex_id(), 4);
        assert!(!child.is_leaf());
        child.to_child(0);
        assert!(child.is_leaf());
        assert_eq!(child.global_node_index(), 7 + 5);
        assert_eq!(child.level(), 2);
        assert_eq!(cursor.level(), 0);

        assert!(grid.oriented_cursor(0).is_none());
    }
}
