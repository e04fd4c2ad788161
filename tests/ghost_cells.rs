use approx::assert_relative_eq;
use hypertree_ghosts::comm::{run_communicators, run_local, LocalCommunicator};
use hypertree_ghosts::cursor::HyperTreeGridNonOrientedCursor;
use hypertree_ghosts::ghost::{GhostCellsGenerator, GhostCellsOptions, GhostCellsSummary};
use hypertree_ghosts::grid::{
    HyperTreeGrid, RandomHyperTreeGridBuilder, TreeRef, DEPTH_ARRAY_NAME, NODE_KEY_ARRAY_NAME,
};
use hypertree_ghosts::traits::Communicator;
use hypertree_ghosts::types::{GHOST_CELL, OWNED_CELL};

type Outcome = (HyperTreeGrid, HyperTreeGrid, GhostCellsSummary);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn generate(
    builder: &RandomHyperTreeGridBuilder,
    size: usize,
    options: &GhostCellsOptions,
) -> Vec<Outcome> {
    run_local(size, |comm| {
        let input = builder.build_partition(comm.rank(), size).unwrap();
        let (output, summary) = GhostCellsGenerator::new(options.clone())
            .generate_with_summary(&input, &comm)
            .unwrap();
        (input, output, summary)
    })
}

fn scenario() -> RandomHyperTreeGridBuilder {
    let mut builder = RandomHyperTreeGridBuilder::new(3, 2, [3, 3, 3]);
    builder.set_max_depth(3);
    builder.set_seed(3);
    builder
}

fn ghost_trees<'a>(
    input: &'a HyperTreeGrid,
    output: &'a HyperTreeGrid,
) -> impl Iterator<Item = usize> + 'a {
    output
        .tree_indices()
        .filter(move |&index| input.tree(index).is_none())
}

/// Walk a ghost tree alongside the same tree of the serial grid, returning the number of nodes.
fn compare_with_serial(
    ghost: &mut HyperTreeGridNonOrientedCursor<TreeRef<'_>>,
    serial: &mut HyperTreeGridNonOrientedCursor<TreeRef<'_>>,
    output: &HyperTreeGrid,
) -> usize {
    let global = ghost.global_node_index();
    let keys = output.cell_data().array(NODE_KEY_ARRAY_NAME).unwrap();
    let depth = output.cell_data().array(DEPTH_ARRAY_NAME).unwrap();
    assert_relative_eq!(
        keys.component(global, 0),
        RandomHyperTreeGridBuilder::node_key(serial.tree_index(), serial.vertex_id())
    );
    assert_relative_eq!(depth.component(global, 0), ghost.level() as f64);
    assert_eq!(ghost.is_masked(), serial.is_masked());
    if ghost.is_leaf() || ghost.is_masked() {
        return 1;
    }
    assert!(!serial.is_leaf());

    let mut count = 1;
    for ichild in 0..ghost.number_of_children() {
        ghost.to_child(ichild);
        serial.to_child(ichild);
        count += compare_with_serial(ghost, serial, output);
        ghost.to_parent();
        serial.to_parent();
    }
    count
}

fn check_outcome(builder: &RandomHyperTreeGridBuilder, outcome: &Outcome) {
    let (input, output, summary) = outcome;
    let serial = builder.build().unwrap();
    let owned = input.global_index_bound();
    let total = owned + summary.ghost_cells;

    // Owned trees and values are untouched
    for (index, tree) in input.trees() {
        assert_eq!(output.tree(index), Some(tree));
    }
    for array in input.cell_data().iter() {
        let copy = output.cell_data().array(array.name()).unwrap();
        for tuple in 0..owned {
            assert_relative_eq!(copy.component(tuple, 0), array.component(tuple, 0));
        }
    }

    // Ghost flags split the nodes at the owned bound
    let flags = output.ghost_array().unwrap();
    assert_eq!(flags.len(), total);
    assert!(flags[..owned].iter().all(|&f| f == OWNED_CELL));
    assert!(flags[owned..].iter().all(|&f| f == GHOST_CELL));
    assert_eq!(output.number_of_ghost_cells(), summary.ghost_cells);

    // Ghost trees are numbered contiguously after the owned nodes
    let mut ranges: Vec<(usize, usize)> = ghost_trees(input, output)
        .map(|index| {
            let tree = output.tree(index).unwrap();
            (tree.global_index_start(), tree.global_index_bound())
        })
        .collect();
    ranges.sort();
    assert_eq!(ranges.len(), summary.ghost_trees);
    let mut next = owned;
    for (start, bound) in ranges {
        assert_eq!(start, next);
        next = bound;
    }
    assert_eq!(next, total);

    let mut visited = 0;
    for index in ghost_trees(input, output) {
        // Every ghost tree touches an owned tree
        let c = output.level_zero_coordinates_from_index(index);
        assert!(input.tree_indices().any(|owned_index| {
            let o = input.level_zero_coordinates_from_index(owned_index);
            (0..3).all(|a| c[a].abs_diff(o[a]) <= 1)
        }));

        let mut ghost = output.non_oriented_cursor(index).unwrap();
        let mut reference = serial.non_oriented_cursor(index).unwrap();
        visited += compare_with_serial(&mut ghost, &mut reference, output);
    }
    assert_eq!(visited, summary.ghost_cells);
}

#[test]
fn test_single_process_is_identity() {
    init_logger();
    let builder = scenario();
    let outcome = generate(&builder, 1, &GhostCellsOptions::default());
    let (input, output, summary) = &outcome[0];
    assert_eq!(output, input);
    assert_eq!(summary, &GhostCellsSummary::default());
    assert!(output.ghost_array().is_none());
}

#[test]
fn test_four_processes() {
    init_logger();
    let builder = scenario();
    let outcomes = generate(&builder, 4, &GhostCellsOptions::default());
    for outcome in &outcomes {
        let (_, output, summary) = outcome;
        assert!(output.has_any_ghost_cells());
        assert!(summary.ghost_trees > 0);
        assert!(summary.ghost_cells > 1);
        check_outcome(&builder, outcome);
    }
}

#[test]
fn test_second_pass_is_a_copy() {
    init_logger();
    let builder = scenario();
    let results = run_local(4, |comm| {
        let input = builder.build_partition(comm.rank(), 4).unwrap();
        let generator = GhostCellsGenerator::default();
        let first = generator.generate(&input, &comm).unwrap();
        let (second, summary) = generator.generate_with_summary(&first, &comm).unwrap();
        (first, second, summary)
    });
    for (first, second, summary) in results {
        assert!(first.has_any_ghost_cells());
        assert_eq!(first, second);
        assert_eq!(summary, GhostCellsSummary::default());
    }
}

#[test]
fn test_two_dimensions() {
    init_logger();
    let mut builder = RandomHyperTreeGridBuilder::new(2, 3, [4, 4, 1]);
    builder.set_max_depth(3);
    builder.set_split_fraction(0.4);
    builder.set_seed(17);
    for outcome in generate(&builder, 3, &GhostCellsOptions::default()) {
        assert!(outcome.2.ghost_trees > 0);
        check_outcome(&builder, &outcome);
    }
}

#[test]
fn test_masked_grid() {
    init_logger();
    let mut builder = scenario();
    builder.set_masked_fraction(0.25);
    builder.set_seed(21);
    for outcome in generate(&builder, 3, &GhostCellsOptions::default()) {
        let (input, output, _) = &outcome;
        assert!(input.has_mask());
        assert!(output.has_mask());
        check_outcome(&builder, &outcome);
    }
}

#[test]
fn test_depth_limiter() {
    init_logger();
    let builder = scenario();
    let results = run_local(2, |comm| {
        let mut input = builder.build_partition(comm.rank(), 2).unwrap();
        input.set_depth_limiter(Some(1));
        let output = GhostCellsGenerator::default()
            .generate(&input, &comm)
            .unwrap();
        (input, output)
    });
    for (input, output) in results {
        assert_eq!(output.depth_limiter(), Some(1));
        for index in ghost_trees(&input, &output) {
            let tree = output.tree(index).unwrap();
            assert!(tree.number_of_vertices() <= 1 + output.number_of_children());
        }
    }
}

#[test]
fn test_without_probe() {
    init_logger();
    let builder = scenario();
    let with_probe = generate(&builder, 4, &GhostCellsOptions::default());

    let comms = LocalCommunicator::universe(4)
        .into_iter()
        .map(LocalCommunicator::without_probe)
        .collect();
    let without_probe = run_communicators(comms, |comm| {
        assert!(!comm.can_probe());
        let input = builder.build_partition(comm.rank(), 4).unwrap();
        let (output, summary) = GhostCellsGenerator::default()
            .generate_with_summary(&input, &comm)
            .unwrap();
        (input, output, summary)
    });

    for (a, b) in with_probe.iter().zip(&without_probe) {
        assert_eq!(a.2, b.2);
        check_outcome(&builder, b);
    }
}

#[test]
fn test_sequential_gather_matches_parallel() {
    init_logger();
    let builder = scenario();
    let mut parallel = GhostCellsOptions::default();
    parallel.set_use_probe(false);
    let mut sequential = parallel.clone();
    sequential.set_parallel_gather(false);

    let a = generate(&builder, 3, &parallel);
    let b = generate(&builder, 3, &sequential);
    for (a, b) in a.iter().zip(&b) {
        assert_eq!(a.1, b.1);
    }
}

#[test]
fn test_more_processes_than_trees() {
    init_logger();
    let mut builder = RandomHyperTreeGridBuilder::new(2, 2, [2, 1, 1]);
    builder.set_seed(1);
    let outcomes = generate(&builder, 4, &GhostCellsOptions::default());
    for (rank, (input, output, summary)) in outcomes.iter().enumerate() {
        if rank % 2 == 0 {
            assert_eq!(input.number_of_non_empty_trees(), 1);
            assert_eq!(summary.ghost_trees, 1);
            assert_eq!(output.number_of_non_empty_trees(), 2);
        } else {
            assert_eq!(output.number_of_non_empty_trees(), 0);
            assert_eq!(summary, &GhostCellsSummary::default());
        }
    }
}
