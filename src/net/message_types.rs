//! Channel payloads passed between a connection's read, dispatch, and write
//! tasks.

use crate::codec::Command;

/// A decoded request frame, still owned by the read task until dispatch.
pub struct Request {
    pub command: Command,
    pub body: Vec<u8>,
}

/// A response frame ready to be written back to the peer.
pub struct Response {
    pub command: Command,
    pub status: u8,
    pub body: Vec<u8>,
}
