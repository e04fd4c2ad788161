//! Trait definitions

mod comm;
mod tree;

pub use comm::{Communicator, Payload, WireType};
pub use tree::{TreeAccess, TreeAccessMut};
