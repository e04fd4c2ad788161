//! Transport over an MPI communicator
use mpi::{
    collective::SystemOperation,
    datatype::Equivalence,
    point_to_point::{Destination, Source},
    topology::Communicator as MpiCommunicatorTrait,
    traits::CommunicatorCollectives,
};

use crate::traits::{Communicator, Payload};
use crate::types::{Error, Result, Tag};

/// A communicator wrapping an MPI communicator.
///
/// Sends are standard mode MPI sends. Small messages are buffered by the MPI library, large
/// ones may block until the destination posts the matching receive.
pub struct MpiCommunicator<'a, C: MpiCommunicatorTrait> {
    comm: &'a C,
}

impl<'a, C: MpiCommunicatorTrait> MpiCommunicator<'a, C> {
    /// Wrap `comm`.
    pub fn new(comm: &'a C) -> Self {
        Self { comm }
    }
}

impl<C: MpiCommunicatorTrait + CommunicatorCollectives> Communicator for MpiCommunicator<'_, C> {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn send<T: Payload>(&self, buffer: &[T], dest: usize, tag: Tag) -> Result<()> {
        if dest >= self.size() {
            return Err(Error::Transport(format!(
                "Cannot send to rank {dest} in a group of {}",
                self.size()
            )));
        }
        self.comm
            .process_at_rank(dest as i32)
            .send_with_tag(buffer, tag);
        Ok(())
    }

    fn receive<T: Payload>(&self, count: usize, source: usize, tag: Tag) -> Result<Vec<T>> {
        if source >= self.size() {
            return Err(Error::InvalidSource {
                rank: source,
                size: self.size(),
            });
        }
        let process = self.comm.process_at_rank(source as i32);
        let (message, status) = process.matched_probe_with_tag(tag);
        let actual = status.count(T::equivalent_datatype()) as usize;
        let mut buffer = vec![T::default(); actual];
        message.matched_receive_into(&mut buffer[..]);
        if actual != count {
            return Err(Error::MessageLength {
                rank: source,
                tag,
                expected: count,
                actual,
            });
        }
        Ok(buffer)
    }

    fn probe(&self, tag: Tag) -> Result<usize> {
        let status = self.comm.any_process().probe_with_tag(tag);
        let source = status.source_rank();
        if source < 0 {
            return Err(Error::ProbeFailed { tag });
        }
        Ok(source as usize)
    }

    fn can_probe(&self) -> bool {
        true
    }

    fn all_reduce_max(&self, values: &[i64]) -> Result<Vec<i64>> {
        let mut result = vec![0i64; values.len()];
        self.comm
            .all_reduce_into(values, &mut result[..], SystemOperation::max());
        Ok(result)
    }

    fn barrier(&self) -> Result<()> {
        self.comm.barrier();
        Ok(())
    }
}
