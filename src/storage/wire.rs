//! Shared body encode/decode helpers for the storage command handlers.
//!
//! Every handler's body starts with an 8-byte length-prefixed file-id
//!, so that piece is
//! factored out here instead of repeated per command.

use crate::codec::primitive::{read_u64, write_u64};
use crate::codec::FrameError;
use crate::storage::Error;

/// Reads the length-prefixed file-id token at the front of `body`, returning
/// the decoded [`crate::fileid::FileId`] and the remaining bytes.
pub fn read_file_id(body: &[u8]) -> Result<(crate::fileid::FileId, &[u8]), Error> {
    let len = read_u64(body).map_err(frame_err)? as usize;
    let rest = &body[8..];
    if rest.len() < len {
        return Err(Error::InvalidRequest("file-id field truncated".into()));
    }
    let token = std::str::from_utf8(&rest[..len])
        .map_err(|_| Error::InvalidRequest("file-id was not valid UTF-8".into()))?;
    let file_id = crate::fileid::FileId::parse(token)
        .map_err(|e| Error::InvalidRequest(format!("malformed file-id: {e}")))?;
    Ok((file_id, &rest[len..]))
}

pub fn write_file_id(out: &mut Vec<u8>, file_id: &crate::fileid::FileId) {
    let rendered = file_id.render();
    write_u64(out, rendered.len() as u64);
    out.extend_from_slice(rendered.as_bytes());
}

fn frame_err(e: FrameError) -> Error {
    Error::InvalidRequest(e.to_string())
}
