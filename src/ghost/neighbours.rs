//! Ownership of the trees and the neighbourhood of each process
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::grid::{stencil, HyperTreeGrid};
use crate::traits::Communicator;
use crate::types::{Error, Result};

/// Owner of every cell of the coarse lattice, the same on every process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeOwnership {
    owners: Vec<i64>,
    any_ghost_cells: bool,
}

impl TreeOwnership {
    /// Collectively build the map from the trees each process holds.
    ///
    /// Each process contributes its rank for the trees it holds and -1 elsewhere; as a tree is
    /// held by at most one process, the element-wise maximum is the owner of every tree. One
    /// extra slot carries whether the process already has ghost cells, so that every process
    /// takes the same decision about it.
    pub fn gather<C: Communicator>(grid: &HyperTreeGrid, comm: &C) -> Result<Self> {
        let ntrees = grid.max_number_of_trees();
        let mut values = vec![-1i64; ntrees + 1];
        let rank = comm.rank() as i64;
        for index in grid.tree_indices() {
            values[index] = rank;
        }
        values[ntrees] = grid.has_any_ghost_cells() as i64;

        let mut owners = comm.all_reduce_max(&values)?;
        if owners.len() != ntrees + 1 {
            return Err(Error::Transport(format!(
                "Reduction returned {} values for {} trees",
                owners.len(),
                ntrees
            )));
        }
        let any_ghost_cells = owners.pop().is_some_and(|flag| flag > 0);
        Ok(Self {
            owners,
            any_ghost_cells,
        })
    }

    /// Build the map from known owners, -1 marking lattice cells without a tree.
    pub fn from_owners(owners: Vec<i64>) -> Self {
        Self {
            owners,
            any_ghost_cells: false,
        }
    }

    /// Whether any process already had ghost cells when the map was gathered.
    pub fn any_ghost_cells(&self) -> bool {
        self.any_ghost_cells
    }

    /// Owner of tree `index`, `None` if no process holds it.
    pub fn owner(&self, index: usize) -> Option<usize> {
        match self.owners.get(index) {
            Some(&owner) if owner >= 0 => Some(owner as usize),
            _ => None,
        }
    }

    /// Number of trees held by any process.
    pub fn number_of_trees(&self) -> usize {
        self.owners.iter().filter(|&&o| o >= 0).count()
    }
}

/// The trees a process exchanges with each of its neighbours.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighbourTopology {
    send: BTreeMap<usize, BTreeMap<usize, u32>>,
    receive: BTreeMap<usize, BTreeSet<usize>>,
}

impl NeighbourTopology {
    /// Find, for every local tree, the processes owning an adjacent tree.
    pub fn resolve(
        grid: &HyperTreeGrid,
        ownership: &TreeOwnership,
        rank: usize,
        size: usize,
    ) -> Self {
        let dimension = grid.dimension();
        let dims = grid.cell_dims();
        let mut topology = Self::default();

        for index in grid.tree_indices() {
            let coordinates = grid.level_zero_coordinates_from_index(index);
            for offset in stencil::neighbour_offsets(dimension) {
                let mut neighbour = [0usize; 3];
                let inside = (0..dimension).all(|a| {
                    let c = coordinates[a] as isize + offset[a];
                    neighbour[a] = c.max(0) as usize;
                    c >= 0 && (c as usize) < dims[a]
                });
                if !inside {
                    continue;
                }
                let neighbour_index = grid.index_from_level_zero_coordinates(&neighbour);
                match ownership.owner(neighbour_index) {
                    Some(owner) if owner != rank && owner < size => {
                        *topology
                            .send
                            .entry(owner)
                            .or_default()
                            .entry(index)
                            .or_insert(0) |= stencil::direction_bit(&offset, dimension);
                        topology
                            .receive
                            .entry(owner)
                            .or_default()
                            .insert(neighbour_index);
                    }
                    _ => {}
                }
            }
        }
        debug!(
            "Rank {rank} has {} neighbours, sends {} trees and receives {} trees",
            topology.neighbours().len(),
            topology.send.values().map(|t| t.len()).sum::<usize>(),
            topology.receive.values().map(|t| t.len()).sum::<usize>()
        );
        topology
    }

    /// Direction masks of the local trees to send, by neighbour rank and tree index.
    pub fn send_trees(&self) -> &BTreeMap<usize, BTreeMap<usize, u32>> {
        &self.send
    }

    /// Trees expected from each neighbour rank.
    pub fn receive_trees(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.receive
    }

    /// Ranks exchanged with, in ascending order.
    pub fn neighbours(&self) -> BTreeSet<usize> {
        self.send
            .keys()
            .chain(self.receive.keys())
            .copied()
            .collect()
    }

    /// Whether the process exchanges nothing.
    pub fn is_empty(&self) -> bool {
        self.send.is_empty() && self.receive.is_empty()
    }
}
