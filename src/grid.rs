//! Grid creation and storage

mod bit_array;
mod cell_data;
mod hyper_tree_grid;
mod random;
pub mod stencil;
mod tree;

pub use bit_array::BitArray;
pub use cell_data::{ArrayValues, CellArray, CellData};
pub use hyper_tree_grid::{HyperTreeGrid, TreeMut, TreeRef};
pub use random::{RandomHyperTreeGridBuilder, DEPTH_ARRAY_NAME, NODE_KEY_ARRAY_NAME};
pub use tree::HyperTree;
