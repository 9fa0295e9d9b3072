use crate::error::{AxonError, Result};
use crate::types::Rank;

/// Size of the record framing header in bytes.
pub const RECORD_HEADER_SIZE: usize = 10;

/// Record traverses an intermediate hop; `dest` is the final destination,
/// not the rank it was transmitted to.
pub const FLAG_ROUTED: u16 = 1 << 0;

/// Record is a broadcast relay rather than a unicast invocation.
pub const FLAG_BCAST: u16 = 1 << 1;

const KNOWN_FLAGS: u16 = FLAG_ROUTED | FLAG_BCAST;

/// 10-byte framing header prepended to every record.
///
/// ```text
/// [0..4]  dest_rank: i32 LE (final destination, even when relayed)
/// [4..8]  payload_size: u32 LE (handler id + packed arguments)
/// [8..10] flags: u16 LE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Final destination rank.
    pub dest: Rank,
    /// Length of the payload following this header.
    pub payload_size: u32,
    /// Routing and broadcast bits.
    pub flags: u16,
}

impl RecordHeader {
    /// Encode header to 10 bytes (little-endian).
    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&(self.dest as i32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[8..10].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Decode header from 10 bytes.
    pub fn decode(buf: &[u8; RECORD_HEADER_SIZE]) -> Result<Self> {
        let dest = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if dest < 0 {
            return Err(AxonError::MalformedRecord("negative destination rank"));
        }
        let payload_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let flags = u16::from_le_bytes([buf[8], buf[9]]);
        if flags & !KNOWN_FLAGS != 0 {
            return Err(AxonError::MalformedRecord("unknown flag bits"));
        }
        Ok(RecordHeader {
            dest: dest as Rank,
            payload_size,
            flags,
        })
    }

    pub fn is_routed(&self) -> bool {
        self.flags & FLAG_ROUTED != 0
    }

    pub fn is_bcast(&self) -> bool {
        self.flags & FLAG_BCAST != 0
    }
}
