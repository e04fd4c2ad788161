//! Deterministic random adaptive grids distributed over a set of processes
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cursor::HyperTreeGridNonOrientedCursor;
use crate::grid::{BitArray, CellArray, HyperTreeGrid};
use crate::traits::TreeAccessMut;
use crate::types::Result;

/// Name of the array holding the level of each node.
pub const DEPTH_ARRAY_NAME: &str = "Depth";

/// Name of the array holding a value that identifies each node independently of its owner.
pub const NODE_KEY_ARRAY_NAME: &str = "NodeKey";

/// Builder of random adaptive grids.
///
/// Every tree draws its refinement from its own random stream, so a process generating only
/// the trees it owns gets exactly the trees a single process would have generated.
#[derive(Clone, Debug)]
pub struct RandomHyperTreeGridBuilder {
    dimension: usize,
    branch_factor: usize,
    cell_dims: [usize; 3],
    max_depth: usize,
    split_fraction: f64,
    masked_fraction: f64,
    seed: u64,
}

impl RandomHyperTreeGridBuilder {
    /// Create a builder for a lattice of `cell_dims` trees.
    pub fn new(dimension: usize, branch_factor: usize, cell_dims: [usize; 3]) -> Self {
        Self {
            dimension,
            branch_factor,
            cell_dims,
            max_depth: 3,
            split_fraction: 0.5,
            masked_fraction: 0.0,
            seed: 0,
        }
    }

    /// Number of levels a tree may have.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        assert!(max_depth > 0, "A tree has at least one level");
        self.max_depth = max_depth;
    }

    /// Probability that a node above the deepest level is refined.
    pub fn set_split_fraction(&mut self, split_fraction: f64) {
        assert!((0.0..=1.0).contains(&split_fraction));
        self.split_fraction = split_fraction;
    }

    /// Probability that a non-root node is masked. A non-zero value gives the grid a mask.
    pub fn set_masked_fraction(&mut self, masked_fraction: f64) {
        assert!((0.0..=1.0).contains(&masked_fraction));
        self.masked_fraction = masked_fraction;
    }

    /// Seed of the random streams.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Process owning tree `tree_index` when trees are split in contiguous blocks over `size`
    /// processes.
    pub fn owner(&self, tree_index: usize, size: usize) -> usize {
        let ntrees: usize = self.cell_dims.iter().product();
        tree_index * size / ntrees
    }

    /// Value of the node key array for node `local` of tree `tree_index`.
    pub fn node_key(tree_index: usize, local: usize) -> f64 {
        (tree_index * 1_000_000 + local) as f64
    }

    /// Build the whole grid on a single process.
    pub fn build(&self) -> Result<HyperTreeGrid> {
        self.build_partition(0, 1)
    }

    /// Build the trees owned by `rank` out of `size` processes.
    ///
    /// Global indices of the local trees are numbered contiguously from zero.
    pub fn build_partition(&self, rank: usize, size: usize) -> Result<HyperTreeGrid> {
        let mut grid = HyperTreeGrid::new(self.dimension, self.branch_factor, self.cell_dims)?;
        if self.masked_fraction > 0.0 {
            grid.set_mask(Some(BitArray::new()));
        }

        let mut depth = CellArray::new_f64(DEPTH_ARRAY_NAME, 1);
        let mut keys = CellArray::new_f64(NODE_KEY_ARRAY_NAME, 1);
        let mut next_global = 0;

        for tree_index in 0..grid.max_number_of_trees() {
            if self.owner(tree_index, size) != rank {
                continue;
            }
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            rng.set_stream(tree_index as u64);

            if let Some(mut cursor) = grid.non_oriented_cursor_mut(tree_index, true) {
                cursor.set_global_index_start(next_global);
                self.refine(&mut cursor, &mut rng, tree_index, &mut depth, &mut keys);
            }
            if let Some(tree) = grid.tree(tree_index) {
                next_global = tree.global_index_bound();
            }
        }

        grid.cell_data_mut().add_array(depth);
        grid.cell_data_mut().add_array(keys);
        Ok(grid)
    }

    fn refine<V: TreeAccessMut>(
        &self,
        cursor: &mut HyperTreeGridNonOrientedCursor<V>,
        rng: &mut ChaCha8Rng,
        tree_index: usize,
        depth: &mut CellArray,
        keys: &mut CellArray,
    ) {
        let global = cursor.global_node_index();
        let level = cursor.level();
        depth.insert_component(global, 0, level as f64);
        keys.insert_component(global, 0, Self::node_key(tree_index, cursor.vertex_id()));

        if self.masked_fraction > 0.0 {
            let masked = level > 0 && rng.gen_bool(self.masked_fraction);
            cursor.set_mask(masked);
            if masked {
                return;
            }
        }

        if level + 1 < self.max_depth && rng.gen_bool(self.split_fraction) {
            cursor.subdivide_leaf();
            for ichild in 0..cursor.number_of_children() {
                cursor.to_child(ichild);
                self.refine(cursor, rng, tree_index, depth, keys);
                cursor.to_parent();
            }
        }
    }
}
