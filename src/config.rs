//! Runtime-configurable tuning parameters for axon.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `AXON_`) or by constructing a custom `AxonConfig`.

use crate::router::RouteLevels;

/// Tuning parameters for the communicator core and transport.
#[derive(Debug, Clone)]
pub struct AxonConfig {
    /// Soft threshold for one per-next-hop send buffer. Appending past this
    /// flushes the buffer as a single transport frame.
    pub buffer_bytes: usize,

    /// High-water mark on total unsent bytes (accumulators plus frames the
    /// transport has not yet accepted). Crossing it forces the sender to
    /// pump progress before enqueuing more.
    pub high_water_bytes: usize,

    /// Size of each posted receive buffer.
    pub recv_buffer_bytes: usize,

    /// Number of receive buffers posted per channel.
    pub recv_queue_depth: usize,

    /// Relay depth for the destination router.
    pub route_levels: RouteLevels,

    /// Maximum buffers the recycling pool retains.
    pub pool_max_buffers: usize,

    /// Ranks grouped onto one node for routing purposes. 0 means the whole
    /// job is treated as a single node.
    pub ranks_per_node: u32,

    /// In-process fabric: frames buffered per (rank, channel) before a
    /// sender sees backpressure.
    pub fabric_frames: usize,
}

impl Default for AxonConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: 256 * 1024,
            high_water_bytes: 4 * 1024 * 1024,
            recv_buffer_bytes: 256 * 1024,
            recv_queue_depth: 4,
            route_levels: RouteLevels::Direct,
            pool_max_buffers: 64,
            ranks_per_node: 0,
            fabric_frames: 64,
        }
    }
}

impl AxonConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `AXON_BUFFER_BYTES`
    /// - `AXON_HIGH_WATER_BYTES`
    /// - `AXON_RECV_BUFFER_BYTES`
    /// - `AXON_RECV_QUEUE_DEPTH`
    /// - `AXON_ROUTE_LEVELS` (1 = direct, 2 = node relay, 3 = hierarchical)
    /// - `AXON_POOL_MAX_BUFFERS`
    /// - `AXON_RANKS_PER_NODE`
    /// - `AXON_FABRIC_FRAMES`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("AXON_BUFFER_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.buffer_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("AXON_HIGH_WATER_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.high_water_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("AXON_RECV_BUFFER_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.recv_buffer_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("AXON_RECV_QUEUE_DEPTH") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.recv_queue_depth = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("AXON_ROUTE_LEVELS") {
            if let Ok(n) = v.parse::<u8>() {
                if let Some(levels) = RouteLevels::from_levels(n) {
                    cfg.route_levels = levels;
                }
            }
        }
        if let Ok(v) = std::env::var("AXON_POOL_MAX_BUFFERS") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.pool_max_buffers = n;
            }
        }
        if let Ok(v) = std::env::var("AXON_RANKS_PER_NODE") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.ranks_per_node = n;
            }
        }
        if let Ok(v) = std::env::var("AXON_FABRIC_FRAMES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.fabric_frames = n.max(1);
            }
        }

        cfg
    }
}
