//! WebSocket transport with length-prefixed framing.
//!
//! Each frame is: 3-byte big-endian length (max 16MiB) then a JSON-encoded [Node].
//!
//! This does not reach WhatsApp servers. The endpoint (`transport.url`, default
//! `ws://127.0.0.1:3001/ws`) must be a gateway that terminates the real protocol
//! (Noise handshake, binary token codec, Signal sessions) and speaks these JSON node
//! frames. Refusing the upgrade with an HTTP status reports that status as a close code.

mod ws;

pub use ws::{WsDialer, WsTransport};

use crate::binary::Node;
use crate::error::Error;
use crate::Result;

/// Maximum frame body size (3-byte length = 2^24 - 1).
pub const MAX_FRAME_SIZE: usize = (1 << 24) - 1;

/// Encode a node into one frame: 3-byte length prefix + body.
pub fn encode_frame(node: &Node) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(node).map_err(|e| Error::Binary(e.to_string()))?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(Error::Binary("frame too large".into()));
    }
    let len = body.len();
    let mut frame = Vec::with_capacity(3 + len);
    frame.extend_from_slice(&[(len >> 16) as u8, (len >> 8) as u8, len as u8]);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode one frame produced by [encode_frame].
pub fn decode_frame(frame: &[u8]) -> Result<Node> {
    if frame.len() < 3 {
        return Err(Error::Binary("frame too short".into()));
    }
    let len = ((frame[0] as usize) << 16) | ((frame[1] as usize) << 8) | (frame[2] as usize);
    if frame.len() != 3 + len {
        return Err(Error::Binary("frame length mismatch".into()));
    }
    serde_json::from_slice(&frame[3..]).map_err(|e| Error::Binary(e.to_string()))
}
