/// Rank of a process in the fixed communicator group (0-indexed).
pub type Rank = u32;

/// Identifier for a node (host) in the job; ranks are grouped onto nodes.
pub type NodeId = u32;

/// Stable small identifier for a registered remote handler.
///
/// Assignment is deterministic across ranks: the handler table is sorted by
/// stable type name at communicator construction, so every rank that runs
/// the same program image agrees on the mapping.
pub type LambdaId = u16;
