//? mpirun -n {{NPROCESSES}} --features "mpi"

#[cfg(feature = "mpi")]
use hypertree_ghosts::{
    comm::MpiCommunicator,
    ghost::GhostCellsGenerator,
    grid::RandomHyperTreeGridBuilder,
    types::GHOST_ARRAY_NAME,
};
#[cfg(feature = "mpi")]
use mpi::{environment::Universe, traits::Communicator};

#[cfg(feature = "mpi")]
fn main() {
    env_logger::init();
    let universe: Universe = mpi::initialize().unwrap();
    let world = universe.world();
    let rank = world.rank() as usize;
    let size = world.size() as usize;

    // A 3x3x3 lattice of binary trees, split in contiguous blocks over the processes
    let mut builder = RandomHyperTreeGridBuilder::new(3, 2, [3, 3, 3]);
    builder.set_max_depth(3);
    builder.set_seed(3);
    let input = builder.build_partition(rank, size).unwrap();

    let comm = MpiCommunicator::new(&world);
    let (output, summary) = GhostCellsGenerator::default()
        .generate_with_summary(&input, &comm)
        .unwrap();

    let range = output
        .cell_data()
        .array(GHOST_ARRAY_NAME)
        .and_then(|a| a.range(0));
    println!(
        "Rank {rank}: {} owned, {} ghost cells in {} trees from {} neighbours, flags in {:?}",
        input.number_of_vertices(),
        summary.ghost_cells,
        summary.ghost_trees,
        summary.neighbours,
        range
    );
}
#[cfg(not(feature = "mpi"))]
fn main() {}
