use bytes::Bytes;

use crate::error::{AxonError, Result};

/// Control messages exchanged on the barrier channel.
///
/// Remote-invocation records never flow through this enum; it carries only
/// the tree synchronization and the termination count reduction. Every
/// message names the barrier epoch it belongs to, which lets receivers
/// assert that no two collectives have interleaved.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMsg {
    /// Control-flow barrier: subtree below the sender has arrived.
    Arrive { epoch: u64 },

    /// Control-flow barrier: root has seen every rank, proceed.
    Release { epoch: u64 },

    /// Termination reduction, leaf to root: counter sums for the sender's
    /// subtree.
    Counts { epoch: u64, sent: u64, received: u64 },

    /// Termination reduction, root to leaves: global counter sums.
    CountsTotal { epoch: u64, sent: u64, received: u64 },
}

impl ControlMsg {
    pub fn to_bytes(&self) -> Result<Bytes> {
        let buf = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| AxonError::EncodeFailed(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&buf))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rkyv::from_bytes::<ControlMsg, rkyv::rancor::Error>(bytes)
            .map_err(|e| AxonError::ControlDecodeFailed(e.to_string()))
    }

    pub fn epoch(&self) -> u64 {
        match self {
            ControlMsg::Arrive { epoch }
            | ControlMsg::Release { epoch }
            | ControlMsg::Counts { epoch, .. }
            | ControlMsg::CountsTotal { epoch, .. } => *epoch,
        }
    }
}
