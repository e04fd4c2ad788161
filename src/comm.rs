//! Implementations of the message passing layer

mod local;
#[cfg(feature = "mpi")]
mod mpi;

pub use local::{run_communicators, run_local, LocalCommunicator};
#[cfg(feature = "mpi")]
pub use self::mpi::MpiCommunicator;
