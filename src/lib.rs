//! axon: asynchronous active messages for bulk-synchronous distributed
//! programs.
//!
//! A sender schedules a handler plus arguments to run on a remote rank; the
//! runtime coalesces, routes, delivers, and invokes it there with no
//! explicit receive. A full barrier terminates exactly when all in-flight
//! work — including invocations spawned by invocations — has executed.

pub mod anchor;
pub mod codec;
pub mod comm;
pub mod config;
pub mod container;
pub mod error;
pub mod layout;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod stats;
pub mod transport;
pub mod types;

pub use anchor::Anchor;
pub use comm::Comm;
pub use config::AxonConfig;
pub use container::{Array, Bag};
pub use error::{AxonError, Result};
pub use layout::Layout;
pub use registry::{Handler, HandlerSet};
pub use router::{RouteLevels, Router};
pub use stats::StatsSnapshot;
pub use transport::{Channel, MemoryEndpoint, MemoryFabric, Transport};
pub use types::{LambdaId, NodeId, Rank};
