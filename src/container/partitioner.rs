use std::hash::{Hash, Hasher};

use crate::types::Rank;

/// Fibonacci multiplier spreading consecutive hashes across the rank space.
const SPREAD: u64 = 2654435769;

/// Key-to-owner mapping for hash-distributed containers.
///
/// The hasher is `DefaultHasher` with its fixed initial state, so every rank
/// computes the same owner for the same key without any exchange. The raw
/// hash is spread with a Fibonacci multiply before the modulo, which keeps
/// clustered key hashes from landing on clustered ranks.
#[derive(Debug, Clone, Copy)]
pub struct HashPartitioner {
    size: u32,
}

impl HashPartitioner {
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "partitioner needs at least one rank");
        Self { size }
    }

    /// The rank owning `key`.
    pub fn owner<K: Hash + ?Sized>(&self, key: &K) -> Rank {
        let mut hasher = std::hash::DefaultHasher::new();
        key.hash(&mut hasher);
        ((hasher.finish().wrapping_mul(SPREAD) >> 32) % u64::from(self.size)) as Rank
    }
}
