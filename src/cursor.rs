//! Traversal of the trees of a grid

mod entry;
mod non_oriented;
mod oriented;

pub use entry::HyperTreeGridEntry;
pub use non_oriented::HyperTreeGridNonOrientedCursor;
pub use oriented::HyperTreeGridOrientedCursor;
