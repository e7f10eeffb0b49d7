//! Wire frame codecs for the stela notification channels.
//!
//! Three one-way channels share the same framed transport: heartbeat
//! (a bare u32 counter), block notifications (height + opaque block
//! bytes), and transaction notifications (opaque transaction bytes).
//! The control channel carries bincode-encoded [`ControlRequest`]s.
//!
//! Block and transaction payloads are opaque to this layer; their
//! serialization is fixed by the ledger crates on either side.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the heartbeat frame: one little-endian u32 counter.
pub const HEARTBEAT_FRAME_SIZE: usize = 4;

/// Minimum size of a block notification frame: the u32 height header.
pub const BLOCK_HEADER_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame truncated: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("bad frame length: expected {expected} bytes, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("control message encoding failed: {0}")]
    Control(String),
}

/// Encode a heartbeat counter as its 4-byte little-endian frame.
pub fn encode_heartbeat(count: u32) -> [u8; HEARTBEAT_FRAME_SIZE] {
    count.to_le_bytes()
}

/// Decode a heartbeat frame. The frame must be exactly 4 bytes.
pub fn decode_heartbeat(frame: &[u8]) -> Result<u32, CodecError> {
    let bytes: [u8; HEARTBEAT_FRAME_SIZE] =
        frame.try_into().map_err(|_| CodecError::BadLength {
            expected: HEARTBEAT_FRAME_SIZE,
            got: frame.len(),
        })?;
    Ok(u32::from_le_bytes(bytes))
}

/// A block notification: the confirmed height followed by the serialized
/// block, which this layer treats as opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockNotification {
    pub height: u32,
    pub block: Vec<u8>,
}

impl BlockNotification {
    /// Encode as height (u32 little-endian) followed by the block bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(BLOCK_HEADER_SIZE + self.block.len());
        frame.extend_from_slice(&self.height.to_le_bytes());
        frame.extend_from_slice(&self.block);
        frame
    }

    /// Decode a block notification frame. Frames shorter than the height
    /// header are malformed.
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < BLOCK_HEADER_SIZE {
            return Err(CodecError::Truncated {
                needed: BLOCK_HEADER_SIZE,
                got: frame.len(),
            });
        }
        let (header, block) = frame.split_at(BLOCK_HEADER_SIZE);
        let height = u32::from_le_bytes(header.try_into().expect("header is 4 bytes"));
        Ok(Self {
            height,
            block: block.to_vec(),
        })
    }
}

/// Requests accepted on the node's control channel.
///
/// Distinct from the notification channels; every request carries the
/// shared secret the node was configured with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Ask the remote node to shut down.
    Stop { secret: String },
}

impl ControlRequest {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Control(e.to_string()))
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(frame).map_err(|e| CodecError::Control(e.to_string()))
    }
}
