//! The three phases of the ghost exchange
//!
//! Every phase sends one message to each neighbour and then receives one message from each
//! neighbour. The trees inside a message are always in ascending tree index order on both
//! sides, so a message is decoded against the receiver's own list of expected trees.
use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::ghost::interface::{extract_interface, reconstruct_interface, TreeInterface};
use crate::ghost::NeighbourTopology;
use crate::grid::{BitArray, HyperTreeGrid};
use crate::traits::Communicator;
use crate::types::{
    Error, Result, Tag, DATA_EXCHANGE_TAG, SIZE_EXCHANGE_TAG, TOPOLOGY_EXCHANGE_TAG,
};

/// A local tree to be sent to one neighbour.
#[derive(Clone, Debug)]
struct SendTree {
    mask: u32,
    interface: TreeInterface,
}

/// A foreign tree expected from one neighbour.
#[derive(Clone, Debug, Default)]
struct ReceiveTree {
    count: usize,
    indices: Vec<usize>,
}

/// State of an exchange between one process and its neighbours.
pub struct GhostExchange<'a, C: Communicator> {
    comm: &'a C,
    input: &'a HyperTreeGrid,
    use_probe: bool,
    parallel_gather: bool,
    send: BTreeMap<usize, BTreeMap<usize, SendTree>>,
    receive: BTreeMap<usize, BTreeMap<usize, ReceiveTree>>,
}

impl<'a, C: Communicator> GhostExchange<'a, C> {
    /// Prepare the exchange of the interfaces of `input` over `topology`.
    ///
    /// Messages are received in arrival order if `use_probe` is set and the communicator can
    /// probe, in ascending rank order otherwise.
    pub fn new(
        comm: &'a C,
        input: &'a HyperTreeGrid,
        topology: &NeighbourTopology,
        use_probe: bool,
        parallel_gather: bool,
    ) -> Self {
        let masked = input.has_mask();
        let send = topology
            .send_trees()
            .iter()
            .map(|(&rank, trees)| {
                let trees = trees
                    .iter()
                    .map(|(&tree, &mask)| {
                        (
                            tree,
                            SendTree {
                                mask,
                                interface: TreeInterface::new(masked),
                            },
                        )
                    })
                    .collect();
                (rank, trees)
            })
            .collect();
        let receive = topology
            .receive_trees()
            .iter()
            .map(|(&rank, trees)| {
                let trees = trees
                    .iter()
                    .map(|&tree| (tree, ReceiveTree::default()))
                    .collect();
                (rank, trees)
            })
            .collect();
        Self {
            comm,
            input,
            use_probe: use_probe && comm.can_probe(),
            parallel_gather,
            send,
            receive,
        }
    }

    /// Number of local trees sent, counted once per neighbour.
    pub fn number_of_sent_trees(&self) -> usize {
        self.send.values().map(|t| t.len()).sum()
    }

    /// Number of foreign trees received.
    pub fn number_of_received_trees(&self) -> usize {
        self.receive.values().map(|t| t.len()).sum()
    }

    /// Next rank to receive from among `pending`, which it is removed from.
    fn next_source(&self, pending: &mut BTreeSet<usize>, tag: Tag) -> Result<usize> {
        if !self.use_probe {
            return pending
                .pop_first()
                .ok_or_else(|| Error::Transport("No message left to receive".into()));
        }
        let source = self.comm.probe(tag)?;
        if source >= self.comm.size() {
            return Err(Error::InvalidSource {
                rank: source,
                size: self.comm.size(),
            });
        }
        if !pending.remove(&source) {
            return Err(Error::UnexpectedCommunication { rank: source, tag });
        }
        Ok(source)
    }

    /// First phase: extract the interfaces and exchange their sizes.
    pub fn exchange_sizes(&mut self) -> Result<()> {
        let comm = self.comm;
        for (&rank, trees) in self.send.iter_mut() {
            let mut counts = Vec::with_capacity(trees.len());
            for (&tree, send) in trees.iter_mut() {
                let mut cursor = self.input.non_oriented_cursor(tree).ok_or_else(|| {
                    Error::InvalidGrid(format!("Tree {tree} is not in the local grid"))
                })?;
                extract_interface(&mut cursor, &mut send.interface, send.mask);
                counts.push(send.interface.count() as u64);
            }
            debug!(
                "Rank {} sends {} interface sizes to rank {rank}",
                comm.rank(),
                counts.len()
            );
            comm.send(&counts, rank, SIZE_EXCHANGE_TAG)?;
        }

        let mut pending: BTreeSet<usize> = self.receive.keys().copied().collect();
        while !pending.is_empty() {
            let source = self.next_source(&mut pending, SIZE_EXCHANGE_TAG)?;
            let trees = self
                .receive
                .get_mut(&source)
                .ok_or(Error::UnexpectedCommunication {
                    rank: source,
                    tag: SIZE_EXCHANGE_TAG,
                })?;
            let counts: Vec<u64> = comm.receive(trees.len(), source, SIZE_EXCHANGE_TAG)?;
            for (receive, count) in trees.values_mut().zip(counts) {
                receive.count = count as usize;
            }
        }
        Ok(())
    }

    /// Second phase: exchange the refinement and mask bits and rebuild the foreign trees.
    ///
    /// Every rebuilt tree is numbered from `next_global`, which is advanced past its nodes.
    /// Returns the number of trees added to `output`.
    pub fn exchange_topology(
        &mut self,
        output: &mut HyperTreeGrid,
        next_global: &mut usize,
    ) -> Result<usize> {
        let comm = self.comm;
        let masked = self.input.has_mask();
        for (&rank, trees) in self.send.iter() {
            let mut buffer = vec![];
            for send in trees.values() {
                let count = send.interface.count();
                if count == 0 {
                    continue;
                }
                buffer.extend(send.interface.is_parent().to_wire(count));
                if let Some(is_masked) = send.interface.is_masked() {
                    buffer.extend(is_masked.to_wire(count));
                }
            }
            comm.send(&buffer, rank, TOPOLOGY_EXCHANGE_TAG)?;
        }

        let streams = if masked { 2 } else { 1 };
        let mut created = 0;
        let mut pending: BTreeSet<usize> = self.receive.keys().copied().collect();
        while !pending.is_empty() {
            let source = self.next_source(&mut pending, TOPOLOGY_EXCHANGE_TAG)?;
            let trees = self
                .receive
                .get_mut(&source)
                .ok_or(Error::UnexpectedCommunication {
                    rank: source,
                    tag: TOPOLOGY_EXCHANGE_TAG,
                })?;
            let length = topology_length(trees, streams)?;
            let buffer: Vec<u8> = comm.receive(length, source, TOPOLOGY_EXCHANGE_TAG)?;

            let mut offset = 0;
            for (&tree, receive) in trees.iter_mut() {
                let count = receive.count;
                if count == 0 {
                    continue;
                }
                let mut next_stream = || {
                    let end = offset + BitArray::wire_len(count);
                    let bits = BitArray::from_wire(&buffer[offset..end], count);
                    offset = end;
                    bits.ok_or_else(|| Error::CorruptStream {
                        tree,
                        reason: format!("malformed stream of {count} bits from rank {source}"),
                    })
                };
                let is_parent = next_stream()?;
                let is_masked = if masked { Some(next_stream()?) } else { None };

                if output.tree(tree).is_some() {
                    return Err(Error::CorruptStream {
                        tree,
                        reason: format!("rank {source} sent a tree that is already present"),
                    });
                }
                let mut cursor = output.non_oriented_cursor_mut(tree, true).ok_or_else(|| {
                    Error::InvalidGrid(format!("Cannot create tree {tree}"))
                })?;
                cursor.set_global_index_start(*next_global);
                let mut position = 0;
                receive.indices = Vec::with_capacity(count);
                reconstruct_interface(
                    &mut cursor,
                    &is_parent,
                    is_masked.as_ref(),
                    &mut receive.indices,
                    &mut position,
                )?;
                if position != count {
                    return Err(Error::CorruptStream {
                        tree,
                        reason: format!("{position} nodes rebuilt out of {count}"),
                    });
                }
                *next_global += output
                    .tree(tree)
                    .map(|t| t.number_of_vertices())
                    .unwrap_or(0);
                created += 1;
            }
            debug!(
                "Rank {} rebuilt {} trees from rank {source}",
                comm.rank(),
                trees.len()
            );
        }
        Ok(created)
    }

    /// Third phase: exchange the cell values of the interfaces and store them at the ghost
    /// indices of `output`.
    pub fn exchange_cell_data(&self, output: &mut HyperTreeGrid) -> Result<()> {
        let comm = self.comm;
        let input = self.input;
        let number_of_components = input.cell_data().number_of_components();
        for (&rank, trees) in self.send.iter() {
            let values = if self.parallel_gather {
                trees
                    .par_iter()
                    .map(|(&tree, send)| gather(input, tree, &send.interface))
                    .collect::<Result<Vec<_>>>()?
            } else {
                trees
                    .iter()
                    .map(|(&tree, send)| gather(input, tree, &send.interface))
                    .collect::<Result<Vec<_>>>()?
            };
            comm.send(&values.concat(), rank, DATA_EXCHANGE_TAG)?;
        }

        let mut pending: BTreeSet<usize> = self.receive.keys().copied().collect();
        while !pending.is_empty() {
            let source = self.next_source(&mut pending, DATA_EXCHANGE_TAG)?;
            let trees = self
                .receive
                .get(&source)
                .ok_or(Error::UnexpectedCommunication {
                    rank: source,
                    tag: DATA_EXCHANGE_TAG,
                })?;
            let length = data_length(trees, number_of_components)?;
            let values: Vec<f64> = comm.receive(length, source, DATA_EXCHANGE_TAG)?;

            let mut values = values.into_iter();
            for receive in trees.values() {
                for array in output.cell_data_mut().iter_mut() {
                    for component in 0..array.number_of_components() {
                        for (&index, value) in receive.indices.iter().zip(values.by_ref()) {
                            array.insert_component(index, component, value);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Number of bytes expected in a topology message, with `streams` bit streams per tree.
fn topology_length(trees: &BTreeMap<usize, ReceiveTree>, streams: usize) -> Result<usize> {
    trees
        .iter()
        .filter(|(_, r)| r.count > 0)
        .try_fold(0usize, |length, (&tree, r)| {
            streams
                .checked_mul(BitArray::wire_len(r.count))
                .and_then(|bytes| length.checked_add(bytes))
                .ok_or_else(|| length_overflow(tree, r.count))
        })
}

/// Number of values expected in a data message.
fn data_length(
    trees: &BTreeMap<usize, ReceiveTree>,
    number_of_components: usize,
) -> Result<usize> {
    trees.iter().try_fold(0usize, |length, (&tree, r)| {
        r.count
            .checked_mul(number_of_components)
            .and_then(|values| length.checked_add(values))
            .ok_or_else(|| length_overflow(tree, r.count))
    })
}

fn length_overflow(tree: usize, count: usize) -> Error {
    Error::CorruptStream {
        tree,
        reason: format!("announced size of {count} nodes overflows the message length"),
    }
}

/// Values of the emitted nodes of one tree, ordered by array, then component, then node.
fn gather(input: &HyperTreeGrid, tree: usize, interface: &TreeInterface) -> Result<Vec<f64>> {
    let hyper_tree = input
        .tree(tree)
        .ok_or_else(|| Error::InvalidGrid(format!("Tree {tree} is not in the local grid")))?;
    let mut values =
        Vec::with_capacity(interface.count() * input.cell_data().number_of_components());
    for array in input.cell_data().iter() {
        for component in 0..array.number_of_components() {
            for &local in interface.indices() {
                let global = hyper_tree.global_index_from_local(local);
                if global >= array.number_of_tuples() {
                    return Err(Error::InvalidGrid(format!(
                        "Array {} has {} tuples, node {global} is out of range",
                        array.name(),
                        array.number_of_tuples()
                    )));
                }
                values.push(array.component(global, component));
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comm::LocalCommunicator;
    use crate::ghost::TreeOwnership;

    /// Two trees side by side, rank 0 owning the left one.
    fn left_tree() -> (HyperTreeGrid, NeighbourTopology) {
        let mut grid = HyperTreeGrid::new(2, 2, [2, 1, 1]).unwrap();
        grid.initialize_tree(0, true);
        let ownership = TreeOwnership::from_owners(vec![0, 1]);
        let topology = NeighbourTopology::resolve(&grid, &ownership, 0, 3);
        (grid, topology)
    }

    #[test]
    fn test_rogue_sender() {
        let comms = LocalCommunicator::universe(3);
        let (grid, topology) = left_tree();

        comms[2].send(&[1u64], 0, SIZE_EXCHANGE_TAG).unwrap();
        let mut exchange = GhostExchange::new(&comms[0], &grid, &topology, true, false);
        assert_eq!(
            exchange.exchange_sizes(),
            Err(Error::UnexpectedCommunication {
                rank: 2,
                tag: SIZE_EXCHANGE_TAG
            })
        );
    }

    #[test]
    fn test_wrong_number_of_sizes() {
        let comms = LocalCommunicator::universe(3);
        let (grid, topology) = left_tree();

        comms[1].send(&[1u64, 1], 0, SIZE_EXCHANGE_TAG).unwrap();
        let mut exchange = GhostExchange::new(&comms[0], &grid, &topology, false, false);
        assert_eq!(
            exchange.exchange_sizes(),
            Err(Error::MessageLength {
                rank: 1,
                tag: SIZE_EXCHANGE_TAG,
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn test_corrupt_trailing_byte() {
        let comms = LocalCommunicator::universe(3);
        let (grid, topology) = left_tree();
        let mut output = grid.clone();

        comms[1].send(&[1u64], 0, SIZE_EXCHANGE_TAG).unwrap();
        comms[1].send(&[0u8, 7], 0, TOPOLOGY_EXCHANGE_TAG).unwrap();
        let mut exchange = GhostExchange::new(&comms[0], &grid, &topology, true, false);
        exchange.exchange_sizes().unwrap();
        let mut next_global = 1;
        assert!(matches!(
            exchange.exchange_topology(&mut output, &mut next_global),
            Err(Error::CorruptStream { tree: 1, .. })
        ));
    }

    #[test]
    fn test_masked_topology_length() {
        let comms = LocalCommunicator::universe(3);
        let (mut grid, topology) = left_tree();
        grid.set_mask(Some(BitArray::new()));
        {
            // Children 1 and 3 face tree 1, child 1 is masked
            let mut cursor = grid.non_oriented_cursor_mut(0, false).unwrap();
            cursor.subdivide_leaf();
            cursor.to_child(1);
            cursor.set_mask(true);
        }
        let mut output = grid.clone();

        // Rank 1 sends a single unmasked leaf, one refinement and one mask stream
        comms[1].send(&[1u64], 0, SIZE_EXCHANGE_TAG).unwrap();
        comms[1].send(&[0u8, 0, 0, 0], 0, TOPOLOGY_EXCHANGE_TAG).unwrap();
        comms[1].send::<f64>(&[], 0, DATA_EXCHANGE_TAG).unwrap();

        let mut exchange = GhostExchange::new(&comms[0], &grid, &topology, true, false);
        exchange.exchange_sizes().unwrap();
        let mut next_global = grid.global_index_bound();
        assert_eq!(next_global, 5);
        assert_eq!(
            exchange.exchange_topology(&mut output, &mut next_global),
            Ok(1)
        );
        assert_eq!(next_global, 6);
        exchange.exchange_cell_data(&mut output).unwrap();

        // Root, three placeholders and the masked child 1, in two streams of 5 bits
        let counts: Vec<u64> = comms[1].receive(1, 0, SIZE_EXCHANGE_TAG).unwrap();
        assert_eq!(counts, vec![5]);
        let length = 2 * BitArray::wire_len(5);
        assert_eq!(length, 4);
        let bits: Vec<u8> = comms[1]
            .receive(length, 0, TOPOLOGY_EXCHANGE_TAG)
            .unwrap();
        assert_eq!(bits, vec![0x80, 0, 0x20, 0]);
    }

    #[test]
    fn test_overflowing_sizes() {
        let huge = ReceiveTree {
            count: usize::MAX,
            indices: vec![],
        };
        let trees: BTreeMap<usize, ReceiveTree> = (0..5).map(|i| (i, huge.clone())).collect();
        assert!(matches!(
            topology_length(&trees, 2),
            Err(Error::CorruptStream { .. })
        ));
        assert!(matches!(
            data_length(&trees, 2),
            Err(Error::CorruptStream { tree: 0, .. })
        ));

        let small = ReceiveTree {
            count: 9,
            indices: vec![],
        };
        let trees = BTreeMap::from([(3, small), (4, ReceiveTree::default())]);
        assert_eq!(topology_length(&trees, 2), Ok(6));
        assert_eq!(data_length(&trees, 3), Ok(27));
    }

    #[test]
    fn test_single_leaf_exchange() {
        let comms = LocalCommunicator::universe(3);
        let (grid, topology) = left_tree();
        let mut output = grid.clone();

        // Rank 1 sends a single leaf with one value
        comms[1].send(&[1u64], 0, SIZE_EXCHANGE_TAG).unwrap();
        comms[1].send(&[0u8, 0], 0, TOPOLOGY_EXCHANGE_TAG).unwrap();
        comms[1].send::<f64>(&[], 0, DATA_EXCHANGE_TAG).unwrap();

        let mut exchange = GhostExchange::new(&comms[0], &grid, &topology, true, true);
        exchange.exchange_sizes().unwrap();
        assert_eq!(exchange.number_of_sent_trees(), 1);
        assert_eq!(exchange.number_of_received_trees(), 1);

        let mut next_global = 1;
        assert_eq!(
            exchange.exchange_topology(&mut output, &mut next_global),
            Ok(1)
        );
        assert_eq!(next_global, 2);
        assert_eq!(output.tree(1).unwrap().global_index_start(), 1);
        exchange.exchange_cell_data(&mut output).unwrap();

        // What rank 0 sent in return
        let counts: Vec<u64> = comms[1].receive(1, 0, SIZE_EXCHANGE_TAG).unwrap();
        assert_eq!(counts, vec![1]);
        let bits: Vec<u8> = comms[1].receive(2, 0, TOPOLOGY_EXCHANGE_TAG).unwrap();
        assert_eq!(bits, vec![0, 0]);
    }
}
