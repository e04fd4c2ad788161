//! In-process transport running one thread per rank
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::traits::{Communicator, Payload};
use crate::types::{Error, Result, Tag};

// Tags reserved for the reduction, the exchange tags are all positive
const REDUCE_TAG: Tag = -1;
const REDUCE_RESULT_TAG: Tag = -2;

struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    arrived: Condvar,
}

struct Shared {
    mailboxes: Vec<Mailbox>,
    barrier: Barrier,
}

/// A communicator between threads of the same process.
///
/// Sends never block: every rank owns a mailbox, a send appends to the destination's mailbox
/// and a receive waits for the first message with matching source and tag.
#[derive(Clone)]
pub struct LocalCommunicator {
    rank: usize,
    shared: Arc<Shared>,
    probe: bool,
}

impl LocalCommunicator {
    /// One communicator per rank of a group of `size` processes.
    pub fn universe(size: usize) -> Vec<Self> {
        assert!(size > 0, "A communicator needs at least one process");
        let shared = Arc::new(Shared {
            mailboxes: (0..size).map(|_| Mailbox::default()).collect(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                shared: Arc::clone(&shared),
                probe: true,
            })
            .collect()
    }

    /// The same communicator, reporting that it cannot probe.
    pub fn without_probe(mut self) -> Self {
        self.probe = false;
        self
    }

    fn mailbox(&self) -> &Mailbox {
        &self.shared.mailboxes[self.rank]
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send<T: Payload>(&self, buffer: &[T], dest: usize, tag: Tag) -> Result<()> {
        let mailbox = self.shared.mailboxes.get(dest).ok_or_else(|| {
            Error::Transport(format!(
                "Cannot send to rank {dest} in a group of {}",
                self.size()
            ))
        })?;
        let mut payload = Vec::with_capacity(buffer.len() * T::WIDTH);
        for value in buffer {
            value.write_le(&mut payload);
        }
        trace!(
            "Rank {} sends {} bytes to rank {dest} with tag {tag}",
            self.rank,
            payload.len()
        );
        mailbox.queue.lock().push_back(Envelope {
            source: self.rank,
            tag,
            payload,
        });
        mailbox.arrived.notify_all();
        Ok(())
    }

    fn receive<T: Payload>(&self, count: usize, source: usize, tag: Tag) -> Result<Vec<T>> {
        if source >= self.size() {
            return Err(Error::InvalidSource {
                rank: source,
                size: self.size(),
            });
        }
        let mailbox = self.mailbox();
        let envelope = {
            let mut queue = mailbox.queue.lock();
            loop {
                if let Some(position) = queue
                    .iter()
                    .position(|e| e.source == source && e.tag == tag)
                {
                    if let Some(envelope) = queue.remove(position) {
                        break envelope;
                    }
                }
                mailbox.arrived.wait(&mut queue);
            }
        };
        if envelope.payload.len() != count * T::WIDTH {
            return Err(Error::MessageLength {
                rank: source,
                tag,
                expected: count,
                actual: envelope.payload.len() / T::WIDTH,
            });
        }
        Ok(envelope
            .payload
            .chunks_exact(T::WIDTH)
            .map(T::read_le)
            .collect())
    }

    fn probe(&self, tag: Tag) -> Result<usize> {
        if !self.probe {
            return Err(Error::ProbeFailed { tag });
        }
        let mailbox = self.mailbox();
        let mut queue = mailbox.queue.lock();
        loop {
            if let Some(envelope) = queue.iter().find(|e| e.tag == tag) {
                return Ok(envelope.source);
            }
            mailbox.arrived.wait(&mut queue);
        }
    }

    fn can_probe(&self) -> bool {
        self.probe
    }

    fn all_reduce_max(&self, values: &[i64]) -> Result<Vec<i64>> {
        if self.rank == 0 {
            let mut result = values.to_vec();
            for source in 1..self.size() {
                let other: Vec<i64> = self.receive(values.len(), source, REDUCE_TAG)?;
                for (r, o) in result.iter_mut().zip(other) {
                    *r = (*r).max(o);
                }
            }
            for dest in 1..self.size() {
                self.send(&result, dest, REDUCE_RESULT_TAG)?;
            }
            Ok(result)
        } else {
            self.send(values, 0, REDUCE_TAG)?;
            self.receive(values.len(), 0, REDUCE_RESULT_TAG)
        }
    }

    fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait();
        Ok(())
    }
}

/// Run `f` on `size` threads, each with its own rank, and collect the results by rank.
pub fn run_local<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalCommunicator) -> R + Sync,
{
    run_communicators(LocalCommunicator::universe(size), f)
}

/// Run `f` on one thread per communicator and collect the results in order.
pub fn run_communicators<R, F>(comms: Vec<LocalCommunicator>, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalCommunicator) -> R + Sync,
{
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_send_receive_out_of_order() {
        let comms = LocalCommunicator::universe(2);
        comms[0].send(&[1u64, 2, 3], 1, 7).unwrap();
        comms[0].send(&[9.5f64], 1, 8).unwrap();

        let values: Vec<f64> = comms[1].receive(1, 0, 8).unwrap();
        assert_eq!(values, vec![9.5]);
        let values: Vec<u64> = comms[1].receive(3, 0, 7).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_probe() {
        let comms = LocalCommunicator::universe(3);
        comms[2].send(&[1u8], 0, 4).unwrap();
        comms[1].send(&[1u8], 0, 5).unwrap();
        assert_eq!(comms[0].probe(5).unwrap(), 1);
        assert_eq!(comms[0].probe(4).unwrap(), 2);

        let comm = comms[0].clone().without_probe();
        assert!(!comm.can_probe());
        assert_eq!(comm.probe(4), Err(Error::ProbeFailed { tag: 4 }));
    }

    #[test]
    fn test_length_mismatch() {
        let comms = LocalCommunicator::universe(2);
        comms[1].send(&[1i64, 2], 0, 3).unwrap();
        let result: Result<Vec<i64>> = comms[0].receive(3, 1, 3);
        assert_eq!(
            result,
            Err(Error::MessageLength {
                rank: 1,
                tag: 3,
                expected: 3,
                actual: 2
            })
        );
        assert!(comms[0].send(&[0u8], 5, 3).is_err());
    }

    #[test]
    fn test_all_reduce_and_barrier() {
        let results = run_local(4, |comm| {
            let mut values = vec![-1i64; 6];
            values[comm.rank()] = comm.rank() as i64;
            values[5] = 10 * comm.rank() as i64;
            comm.barrier().unwrap();
            comm.all_reduce_max(&values).unwrap()
        });
        for result in results {
            assert_eq!(result, vec![0, 1, 2, 3, -1, 30]);
        }
    }
}
