//! Ghost cells
//!
//! A process holding some trees of a distributed grid receives, from each neighbouring
//! process, the part of every foreign tree adjacent to one of its own trees. The exchange has
//! three phases: the sizes of the interfaces, their refinement and mask bits, and finally the
//! cell values. The rebuilt trees are numbered after the owned nodes and flagged in the
//! [GHOST_ARRAY_NAME](crate::types::GHOST_ARRAY_NAME) array.

mod exchange;
mod generator;
mod interface;
mod neighbours;

pub use exchange::GhostExchange;
pub use generator::{GhostCellsGenerator, GhostCellsOptions, GhostCellsSummary};
pub use interface::{extract_interface, reconstruct_interface, TreeInterface};
pub use neighbours::{NeighbourTopology, TreeOwnership};
