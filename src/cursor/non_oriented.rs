//! Cursor with ancestor access
use crate::cursor::HyperTreeGridEntry;
use crate::grid::HyperTree;
use crate::traits::{TreeAccess, TreeAccessMut};

/// A cursor keeping one entry per level from the root down to the current node.
///
/// Moving to a child pushes a copy of the current entry and descends in it, moving to the
/// parent only steps back in the stack, so backtracking is O(1) and no node stores a pointer
/// to its parent. Entries above the current level are kept and reused by the next descent.
#[derive(Clone, Debug)]
pub struct HyperTreeGridNonOrientedCursor<V> {
    access: V,
    entries: Vec<HyperTreeGridEntry>,
    last_valid_entry: usize,
}

impl<V: TreeAccess> HyperTreeGridNonOrientedCursor<V> {
    /// Cursor at the root of the tree behind `access`.
    pub fn new(access: V) -> Self {
        Self {
            access,
            entries: vec![HyperTreeGridEntry::root()],
            last_valid_entry: 0,
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

    /// Direction masks of the children of a coarse node.
    pub fn child_masks(&self) -> &[u32] {
        self.access.child_masks()
    }

    fn entry(&self) -> &HyperTreeGridEntry {
        &self.entries[self.last_valid_entry]
    }

    /// Local index of the current node.
    pub fn vertex_id(&self) -> usize {
        self.entry().vertex_id()
    }

    /// Global index of the current node.
    pub fn global_node_index(&self) -> usize {
        self.entry().global_node_index(self.access.tree())
    }

    /// Number of children of a coarse node.
    pub fn number_of_children(&self) -> usize {
        self.access.tree().number_of_children()
    }

    /// Whether the current node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.entry().is_leaf(&self.access, self.last_valid_entry)
    }

    /// Whether the current node is masked.
    pub fn is_masked(&self) -> bool {
        self.entry().is_masked(&self.access)
    }

    /// Whether the cursor is at the root of the tree.
    pub fn is_root(&self) -> bool {
        self.last_valid_entry == 0
    }

    /// Level of the current node, the root being at level 0.
    pub fn level(&self) -> usize {
        self.last_valid_entry
    }

    /// Move to child `ichild`.
    pub fn to_child(&mut self, ichild: usize) {
        let level = self.last_valid_entry;
        let current = self.entries[level];
        if level + 1 == self.entries.len() {
            self.entries.push(current);
        } else {
            self.entries[level + 1] = current;
        }
        self.last_valid_entry += 1;
        self.entries[level + 1].to_child(&self.access, level, ichild);
    }

    /// Move back to the parent of the current node.
    pub fn to_parent(&mut self) {
        assert!(self.last_valid_entry > 0, "The root has no parent");
        self.last_valid_entry -= 1;
    }

    /// Move back to the root.
    pub fn to_root(&mut self) {
        self.last_valid_entry = 0;
    }
}

impl<V: TreeAccessMut> HyperTreeGridNonOrientedCursor<V> {
    /// Mutable tree access of the cursor.
    pub fn access_mut(&mut self) -> &mut V {
        &mut self.access
    }

    /// Set the mask bit of the current node.
    pub fn set_mask(&mut self, state: bool) {
        let entry = self.entries[self.last_valid_entry];
        entry.set_mask(&mut self.access, state);
    }

    /// Refine the current leaf.
    pub fn subdivide_leaf(&mut self) {
        let entry = self.entries[self.last_valid_entry];
        entry.subdivide_leaf(&mut self.access, self.last_valid_entry);
    }

    /// Number the nodes of the tree from `start`.
    pub fn set_global_index_start(&mut self, start: usize) {
        let entry = self.entries[self.last_valid_entry];
        entry.set_global_index_start(self.access.tree_mut(), start);
    }

    /// Give the current node an explicit global index.
    pub fn set_global_index_from_local(&mut self, global: usize) {
        let entry = self.entries[self.last_valid_entry];
        entry.set_global_index_from_local(self.access.tree_mut(), global);
    }
}

#[cfg(test)]
mod test {
    use crate::grid::{BitArray, HyperTreeGrid};

    fn two_level_grid() -> HyperTreeGrid {
        let mut grid = HyperTreeGrid::new(3, 2, [1, 1, 1]).unwrap();
        let mut cursor = grid.non_oriented_cursor_mut(0, true).unwrap();
        cursor.subdivide_leaf();
        for ichild in [2, 7] {
            cursor.to_child(ichild);
            cursor.subdivide_leaf();
            cursor.to_parent();
        }
        grid
    }

    #[test]
    fn test_to_parent_restores_position() {
        let grid = two_level_grid();
        let mut cursor = grid.non_oriented_cursor(0).unwrap();
        cursor.to_child(2);
        let id = cursor.vertex_id();
        cursor.to_child(5);
        assert_eq!(cursor.level(), 2);
        assert!(cursor.is_leaf());
        cursor.to_parent();
        assert_eq!(cursor.vertex_id(), id);
        cursor.to_parent();
        assert!(cursor.is_root());
        assert_eq!(cursor.vertex_id(), 0);

        // Reuses the stale slot of the previous descent
        cursor.to_child(7);
        cursor.to_child(0);
        assert_eq!(cursor.vertex_id(), 17);
    }

    #[test]
    #[should_panic]
    fn test_root_has_no_parent() {
        let grid = two_level_grid();
        let mut cursor = grid.non_oriented_cursor(0).unwrap();
        cursor.to_parent();
    }

    #[test]
    fn test_clone_is_deep() {
        let grid = two_level_grid();
        let mut cursor = grid.non_oriented_cursor(0).unwrap();
        cursor.to_child(7);
        let mut copy = cursor.clone();
        copy.to_child(1);
        copy.to_parent();
        copy.to_parent();
        assert!(copy.is_root());
        assert_eq!(cursor.level(), 1);
        assert_eq!(cursor.vertex_id(), 8);
        cursor.to_parent();
        assert!(cursor.is_root());
    }

    #[test]
    fn test_masked_node() {
        let mut grid = two_level_grid();
        grid.set_mask(Some(BitArray::new()));
        {
            let mut cursor = grid.non_oriented_cursor_mut(0, false).unwrap();
            cursor.to_child(4);
            cursor.set_mask(true);
        }
        let mut cursor = grid.non_oriented_cursor(0).unwrap();
        assert!(!cursor.is_masked());
        cursor.to_child(4);
        assert!(cursor.is_masked());
        assert_eq!(grid.mask().unwrap().count_ones(), 1);
    }
}
