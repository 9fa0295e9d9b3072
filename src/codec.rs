//! Argument tuple packing.
//!
//! Remote handler arguments travel as bincode with fixed-width little-endian
//! integer encoding; `unpack(pack(v)) == v` holds for every type the runtime
//! accepts (integers, bools, floats, strings, tuples, user structs, sequence
//! and map containers). The record payload is the two-byte handler id
//! followed by the packed tuple.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AxonError, Result};
use crate::types::LambdaId;

/// Pack one value into bytes.
pub fn pack<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| AxonError::EncodeFailed(e.to_string()))
}

/// Reconstruct a value packed by [`pack`].
pub fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| AxonError::DecodeFailed(e.to_string()))
}

/// Build a record payload: handler id followed by the packed arguments.
pub fn record_payload<T: Serialize>(id: LambdaId, args: &T) -> Result<Vec<u8>> {
    let packed = pack(args)?;
    let mut payload = Vec::with_capacity(2 + packed.len());
    payload.extend_from_slice(&id.to_le_bytes());
    payload.extend_from_slice(&packed);
    Ok(payload)
}

/// Split a record payload back into handler id and argument bytes.
pub fn split_payload(payload: &[u8]) -> Result<(LambdaId, &[u8])> {
    if payload.len() < 2 {
        return Err(AxonError::MalformedRecord("payload shorter than handler id"));
    }
    let id = LambdaId::from_le_bytes([payload[0], payload[1]]);
    Ok((id, &payload[2..]))
}
