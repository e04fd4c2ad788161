//! A coarse lattice of hyper trees
use std::collections::BTreeMap;

use crate::cursor::{HyperTreeGridNonOrientedCursor, HyperTreeGridOrientedCursor};
use crate::grid::{stencil, BitArray, CellData, HyperTree};
use crate::traits::{TreeAccess, TreeAccessMut};
use crate::types::{Error, Result, GHOST_ARRAY_NAME, OWNED_CELL};

/// A grid made of a coarse `cell_dims` lattice, where every lattice cell may hold a tree.
///
/// Trees are kept in ascending tree index order. Cell data and the mask are indexed by the
/// global node indices of the trees.
#[derive(Clone, Debug, PartialEq)]
pub struct HyperTreeGrid {
    dimension: usize,
    branch_factor: usize,
    number_of_children: usize,
    cell_dims: [usize; 3],
    child_masks: Vec<u32>,
    trees: BTreeMap<usize, HyperTree>,
    mask: Option<BitArray>,
    depth_limiter: Option<usize>,
    cell_data: CellData,
}

impl HyperTreeGrid {
    /// Create a grid without trees.
    ///
    /// `dimension` and `branch_factor` must each be 2 or 3. A 2D grid has `cell_dims[2] == 1`.
    pub fn new(dimension: usize, branch_factor: usize, cell_dims: [usize; 3]) -> Result<Self> {
        if !(2..=3).contains(&dimension) {
            return Err(Error::InvalidGrid(format!(
                "Unsupported dimension {dimension}"
            )));
        }
        if !(2..=3).contains(&branch_factor) {
            return Err(Error::InvalidGrid(format!(
                "Unsupported branch factor {branch_factor}"
            )));
        }
        if cell_dims.iter().any(|&n| n == 0) {
            return Err(Error::InvalidGrid(format!(
                "Lattice dimensions {cell_dims:?} must be positive"
            )));
        }
        if dimension == 2 && cell_dims[2] != 1 {
            return Err(Error::InvalidGrid(format!(
                "A 2D lattice must have a single layer, got {cell_dims:?}"
            )));
        }
        Ok(Self {
            dimension,
            branch_factor,
            number_of_children: branch_factor.pow(dimension as u32),
            cell_dims,
            child_masks: stencil::child_masks(dimension, branch_factor),
            trees: BTreeMap::new(),
            mask: None,
            depth_limiter: None,
            cell_data: CellData::new(),
        })
    }

    /// Dimension of the grid.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of subdivisions of a coarse node along each axis.
    pub fn branch_factor(&self) -> usize {
        self.branch_factor
    }

    /// Number of children of a coarse node.
    pub fn number_of_children(&self) -> usize {
        self.number_of_children
    }

    /// Number of lattice cells along each axis.
    pub fn cell_dims(&self) -> [usize; 3] {
        self.cell_dims
    }

    /// Number of lattice cells, i.e. the largest possible number of trees.
    pub fn max_number_of_trees(&self) -> usize {
        self.cell_dims.iter().product()
    }

    /// Lattice coordinates of the tree `index`.
    pub fn level_zero_coordinates_from_index(&self, index: usize) -> [usize; 3] {
        let [nx, ny, _] = self.cell_dims;
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    /// Tree index of the lattice cell at `coordinates`.
    pub fn index_from_level_zero_coordinates(&self, coordinates: &[usize; 3]) -> usize {
        let [nx, ny, _] = self.cell_dims;
        coordinates[0] + coordinates[1] * nx + coordinates[2] * nx * ny
    }

    /// Direction mask of child `ichild`, see [stencil::child_masks].
    pub fn child_mask(&self, ichild: usize) -> u32 {
        self.child_masks[ichild]
    }

    /// Tree at lattice index `index`.
    pub fn tree(&self, index: usize) -> Option<&HyperTree> {
        self.trees.get(&index)
    }

    /// Mutable tree at lattice index `index`.
    pub fn tree_mut(&mut self, index: usize) -> Option<&mut HyperTree> {
        self.trees.get_mut(&index)
    }

    /// Tree at lattice index `index`, created as a single leaf if missing and `create` is set.
    pub fn initialize_tree(&mut self, index: usize, create: bool) -> Option<&mut HyperTree> {
        assert!(
            index < self.max_number_of_trees(),
            "Tree index {index} outside of the lattice"
        );
        if create {
            let number_of_children = self.number_of_children;
            Some(
                self.trees
                    .entry(index)
                    .or_insert_with(|| HyperTree::new(index, number_of_children)),
            )
        } else {
            self.trees.get_mut(&index)
        }
    }

    /// Iterate over the trees in ascending index order.
    pub fn trees(&self) -> impl Iterator<Item = (usize, &HyperTree)> {
        self.trees.iter().map(|(&i, t)| (i, t))
    }

    /// Indices of the trees in ascending order.
    pub fn tree_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.trees.keys().copied()
    }

    /// Number of lattice cells that hold a tree.
    pub fn number_of_non_empty_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total number of tree nodes.
    pub fn number_of_vertices(&self) -> usize {
        self.trees.values().map(|t| t.number_of_vertices()).sum()
    }

    /// One past the largest global index of any node.
    pub fn global_index_bound(&self) -> usize {
        self.trees
            .values()
            .map(|t| t.global_index_bound())
            .max()
            .unwrap_or(0)
    }

    /// Whether the grid carries a mask.
    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// The mask, indexed by global node index.
    pub fn mask(&self) -> Option<&BitArray> {
        self.mask.as_ref()
    }

    /// Replace the mask.
    pub fn set_mask(&mut self, mask: Option<BitArray>) {
        self.mask = mask;
    }

    /// Level below which traversals do not descend.
    pub fn depth_limiter(&self) -> Option<usize> {
        self.depth_limiter
    }

    /// Set the level below which traversals do not descend.
    pub fn set_depth_limiter(&mut self, depth_limiter: Option<usize>) {
        self.depth_limiter = depth_limiter;
    }

    /// The cell arrays.
    pub fn cell_data(&self) -> &CellData {
        &self.cell_data
    }

    /// The cell arrays.
    pub fn cell_data_mut(&mut self) -> &mut CellData {
        &mut self.cell_data
    }

    /// The ghost array, if any.
    pub fn ghost_array(&self) -> Option<&[u8]> {
        self.cell_data
            .array(GHOST_ARRAY_NAME)
            .and_then(|a| a.as_u8())
    }

    /// Number of cells flagged as ghosts.
    pub fn number_of_ghost_cells(&self) -> usize {
        self.ghost_array()
            .map(|g| g.iter().filter(|&&v| v != OWNED_CELL).count())
            .unwrap_or(0)
    }

    /// Whether any cell is flagged as a ghost.
    pub fn has_any_ghost_cells(&self) -> bool {
        self.number_of_ghost_cells() > 0
    }

    /// A grid with the same lattice, topology and array layout, but no trees, mask or tuples.
    pub fn copy_empty_structure(&self) -> Self {
        Self {
            dimension: self.dimension,
            branch_factor: self.branch_factor,
            number_of_children: self.number_of_children,
            cell_dims: self.cell_dims,
            child_masks: self.child_masks.clone(),
            trees: BTreeMap::new(),
            mask: None,
            depth_limiter: self.depth_limiter,
            cell_data: self.cell_data.copy_empty(),
        }
    }

    /// Whether `other` is built on the same lattice with the same branch factor.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self.branch_factor == other.branch_factor
            && self.cell_dims == other.cell_dims
    }

    fn tree_ref(&self, index: usize) -> Option<TreeRef<'_>> {
        let tree = self.trees.get(&index)?;
        Some(TreeRef {
            tree,
            mask: self.mask.as_ref(),
            depth_limiter: self.depth_limiter,
            child_masks: &self.child_masks,
        })
    }

    fn tree_access_mut(&mut self, index: usize, create: bool) -> Option<TreeMut<'_>> {
        if create {
            self.initialize_tree(index, true);
        }
        let Self {
            trees,
            mask,
            depth_limiter,
            child_masks,
            ..
        } = self;
        let tree = trees.get_mut(&index)?;
        Some(TreeMut {
            tree,
            mask: mask.as_mut(),
            depth_limiter: *depth_limiter,
            child_masks,
        })
    }

    /// Oriented cursor at the root of tree `index`.
    pub fn oriented_cursor(
        &self,
        index: usize,
    ) -> Option<HyperTreeGridOrientedCursor<TreeRef<'_>>> {
        self.tree_ref(index).map(HyperTreeGridOrientedCursor::new)
    }

    /// Non-oriented cursor at the root of tree `index`.
    pub fn non_oriented_cursor(
        &self,
        index: usize,
    ) -> Option<HyperTreeGridNonOrientedCursor<TreeRef<'_>>> {
        self.tree_ref(index).map(HyperTreeGridNonOrientedCursor::new)
    }

    /// Mutable oriented cursor at the root of tree `index`, creating the tree if `create` is set.
    pub fn oriented_cursor_mut(
        &mut self,
        index: usize,
        create: bool,
    ) -> Option<HyperTreeGridOrientedCursor<TreeMut<'_>>> {
        self.tree_access_mut(index, create)
            .map(HyperTreeGridOrientedCursor::new)
    }

    /// Mutable non-oriented cursor at the root of tree `index`.
    ///
    /// The tree is created if it is missing and `create` is set.
    pub fn non_oriented_cursor_mut(
        &mut self,
        index: usize,
        create: bool,
    ) -> Option<HyperTreeGridNonOrientedCursor<TreeMut<'_>>> {
        self.tree_access_mut(index, create)
            .map(HyperTreeGridNonOrientedCursor::new)
    }
}

/// Read access to one tree of a grid.
#[derive(Clone, Copy, Debug)]
pub struct TreeRef<'a> {
    tree: &'a HyperTree,
    mask: Option<&'a BitArray>,
    depth_limiter: Option<usize>,
    child_masks: &'a [u32],
}

impl TreeAccess for TreeRef<'_> {
    fn tree(&self) -> &HyperTree {
        self.tree
    }
    fn mask(&self) -> Option<&BitArray> {
        self.mask
    }
    fn depth_limiter(&self) -> Option<usize> {
        self.depth_limiter
    }
    fn child_masks(&self) -> &[u32] {
        self.child_masks
    }
}

/// Write access to one tree of a grid.
#[derive(Debug)]
pub struct TreeMut<'a> {
    tree: &'a mut HyperTree,
    mask: Option<&'a mut BitArray>,
    depth_limiter: Option<usize>,
    child_masks: &'a [u32],
}

impl TreeAccess for TreeMut<'_> {
    fn tree(&self) -> &HyperTree {
        self.tree
    }
    fn mask(&self) -> Option<&BitArray> {
        self.mask.as_deref()
    }
    fn depth_limiter(&self) -> Option<usize> {
        self.depth_limiter
    }
    fn child_masks(&self) -> &[u32] {
        self.child_masks
    }
}

impl TreeAccessMut for TreeMut<'_> {
    fn tree_mut(&mut self) -> &mut HyperTree {
        self.tree
    }
    fn mask_mut(&mut self) -> Option<&mut BitArray> {
        self.mask.as_deref_mut()
    }
}
