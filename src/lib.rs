//! Ghost cell generation for distributed hyper tree grids
//!
//! A [HyperTreeGrid](grid::HyperTreeGrid) is a coarse lattice of cells, each of which may hold
//! an adaptive tree. When the trees are shared out over a set of processes, each process can
//! ask [GhostCellsGenerator](ghost::GhostCellsGenerator) for a copy of its grid extended with
//! the parts of the neighbouring processes' trees that touch its own.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod comm;
pub mod cursor;
pub mod ghost;
pub mod grid;
pub mod traits;
pub mod types;
