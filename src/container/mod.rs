//! Distributed containers built on the communicator's public contract.
//!
//! Containers own no communication machinery: they hold an [`Anchor`] to
//! their rank-local storage and express every mutation as a posted remote
//! invocation. They must be constructed collectively — same order, every
//! rank — and their handler types registered with the communicator's
//! [`HandlerSet`](crate::registry::HandlerSet).

mod array;
mod bag;
mod partitioner;

pub use array::{
    AddOp, Array, ArrayAdd, ArrayBinaryOp, ArraySet, ArrayVisit, ArrayVisitor, BinaryOp,
};
pub use bag::{Bag, BagInsert};
pub use partitioner::HashPartitioner;
