//! Generation of ghost cells for a distributed grid
use log::{debug, error, info, warn};

use crate::ghost::{GhostExchange, NeighbourTopology, TreeOwnership};
use crate::grid::{ArrayValues, CellArray, HyperTreeGrid};
use crate::traits::Communicator;
use crate::types::{Result, GHOST_ARRAY_NAME, GHOST_CELL, OWNED_CELL};

/// Options for ghost cell generation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostCellsOptions {
    use_probe: bool,
    parallel_gather: bool,
}

impl Default for GhostCellsOptions {
    fn default() -> Self {
        Self {
            use_probe: true,
            parallel_gather: true,
        }
    }
}

impl GhostCellsOptions {
    /// Receive messages in arrival order.
    ///
    /// If unset, or if the communicator cannot probe, messages are received in ascending rank
    /// order. This is only deadlock free when sends complete without a matching receive.
    pub fn set_use_probe(&mut self, use_probe: bool) {
        self.use_probe = use_probe;
    }

    /// Whether messages are received in arrival order.
    pub fn use_probe(&self) -> bool {
        self.use_probe
    }

    /// Gather the values sent to a neighbour on the rayon thread pool.
    pub fn set_parallel_gather(&mut self, parallel_gather: bool) {
        self.parallel_gather = parallel_gather;
    }

    /// Whether values are gathered in parallel.
    pub fn parallel_gather(&self) -> bool {
        self.parallel_gather
    }
}

/// What a process received while generating ghost cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GhostCellsSummary {
    /// Number of processes exchanged with.
    pub neighbours: usize,
    /// Number of local trees sent, counted once per neighbour.
    pub sent_trees: usize,
    /// Number of foreign trees added to the grid.
    pub ghost_trees: usize,
    /// Number of nodes added to the grid.
    pub ghost_cells: usize,
}

/// Generator of one layer of ghost trees around the trees of each process.
#[derive(Clone, Debug, Default)]
pub struct GhostCellsGenerator {
    options: GhostCellsOptions,
}

impl GhostCellsGenerator {
    /// Create a generator.
    pub fn new(options: GhostCellsOptions) -> Self {
        Self { options }
    }

    /// The options of the generator.
    pub fn options(&self) -> &GhostCellsOptions {
        &self.options
    }

    /// Copy `input` and add the parts of the neighbouring trees it touches.
    ///
    /// This is a collective operation, every process of `comm` must call it.
    pub fn generate<C: Communicator>(
        &self,
        input: &HyperTreeGrid,
        comm: &C,
    ) -> Result<HyperTreeGrid> {
        self.generate_with_summary(input, comm)
            .map(|(output, _)| output)
    }

    /// As [GhostCellsGenerator::generate], also returning what was received.
    pub fn generate_with_summary<C: Communicator>(
        &self,
        input: &HyperTreeGrid,
        comm: &C,
    ) -> Result<(HyperTreeGrid, GhostCellsSummary)> {
        self.run(input, comm).inspect_err(|e| {
            error!(
                "Rank {} failed to generate ghost cells: {e}",
                comm.rank()
            )
        })
    }

    fn run<C: Communicator>(
        &self,
        input: &HyperTreeGrid,
        comm: &C,
    ) -> Result<(HyperTreeGrid, GhostCellsSummary)> {
        let rank = comm.rank();
        if comm.size() == 1 {
            if input.has_any_ghost_cells() {
                warn!("The grid already has ghost cells, it is copied unchanged");
            } else {
                debug!("Single process, no ghost cells to generate");
            }
            return Ok((input.clone(), GhostCellsSummary::default()));
        }

        // Collective, so every process agrees on the early returns below
        let ownership = TreeOwnership::gather(input, comm)?;
        if ownership.any_ghost_cells() {
            warn!("Rank {rank}: the grid already has ghost cells, it is copied unchanged");
            return Ok((input.clone(), GhostCellsSummary::default()));
        }
        if ownership.number_of_trees() == 0 {
            debug!("Rank {rank}: no process holds a tree");
            return Ok((input.clone(), GhostCellsSummary::default()));
        }
        let topology = NeighbourTopology::resolve(input, &ownership, rank, comm.size());

        let mut output = input.clone();
        let owned_bound = input.global_index_bound();
        let mut next_global = owned_bound;
        let mut exchange = GhostExchange::new(
            comm,
            input,
            &topology,
            self.options.use_probe,
            self.options.parallel_gather,
        );

        exchange.exchange_sizes()?;
        comm.barrier()?;
        debug!("Rank {rank}: interface sizes exchanged");

        let ghost_trees = exchange.exchange_topology(&mut output, &mut next_global)?;
        comm.barrier()?;
        debug!("Rank {rank}: {ghost_trees} ghost trees rebuilt");

        exchange.exchange_cell_data(&mut output)?;
        debug!("Rank {rank}: cell data exchanged");

        let summary = GhostCellsSummary {
            neighbours: topology.neighbours().len(),
            sent_trees: exchange.number_of_sent_trees(),
            ghost_trees,
            ghost_cells: next_global - owned_bound,
        };
        if input.number_of_non_empty_trees() == 0 {
            return Ok((output, summary));
        }

        output
            .cell_data_mut()
            .add_array(ghost_array(owned_bound, next_global));
        info!(
            "Rank {rank}: {} ghost cells in {} trees from {} neighbours",
            summary.ghost_cells, summary.ghost_trees, summary.neighbours
        );
        Ok((output, summary))
    }
}

/// Ghost flags of `total` nodes, the first `owned` of which are owned.
fn ghost_array(owned: usize, total: usize) -> CellArray {
    let values = (0..total)
        .map(|i| if i < owned { OWNED_CELL } else { GHOST_CELL })
        .collect();
    CellArray::new(GHOST_ARRAY_NAME, 1, ArrayValues::UInt8(values))
}
