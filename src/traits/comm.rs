//! Message passing between cooperating processes
use crate::types::{Result, Tag};

#[cfg(feature = "mpi")]
mod wire {
    /// Bound required by the transports for message elements.
    pub trait WireType: mpi::datatype::Equivalence {}
    impl<T: mpi::datatype::Equivalence> WireType for T {}
}

#[cfg(not(feature = "mpi"))]
mod wire {
    /// Bound required by the transports for message elements.
    pub trait WireType {}
    impl<T> WireType for T {}
}

pub use wire::WireType;

/// A plain value that can be sent in a message.
pub trait Payload: WireType + Copy + Default + Send + Sync + 'static {
    /// Number of bytes of one value when serialised.
    const WIDTH: usize;

    /// Append the little endian bytes of the value.
    fn write_le(&self, out: &mut Vec<u8>);

    /// Read a value from exactly [Payload::WIDTH] little endian bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_payload {
    ($($t:ty),*) => {
        $(
            impl Payload for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_payload!(u8, u64, i64, f64);

/// A group of processes exchanging tagged messages.
///
/// Every call blocks until it can complete. Messages between one pair of processes with the
/// same tag are received in the order they were sent.
pub trait Communicator {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Send `buffer` to process `dest`.
    fn send<T: Payload>(&self, buffer: &[T], dest: usize, tag: Tag) -> Result<()>;

    /// Receive a message of exactly `count` values from process `source`.
    fn receive<T: Payload>(&self, count: usize, source: usize, tag: Tag) -> Result<Vec<T>>;

    /// Wait for a message with `tag` from any process and return its source, without receiving it.
    fn probe(&self, tag: Tag) -> Result<usize>;

    /// Whether [Communicator::probe] is supported.
    fn can_probe(&self) -> bool;

    /// Element-wise maximum of `values` over all processes, returned on every process.
    fn all_reduce_max(&self, values: &[i64]) -> Result<Vec<i64>>;

    /// Wait until every process has reached the barrier.
    fn barrier(&self) -> Result<()>;
}
