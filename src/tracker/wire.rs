//! Body layouts for the three tracker-side commands, following the same
//! length-prefixed string convention as the storage handlers' file-id
//! field.

use crate::codec::primitive::{read_u64, write_u64};
use crate::tracker::registry::NodeState;
use crate::tracker::Error;

/// Reads a length-prefixed UTF-8 string at the front of `body`, returning
/// it and the remaining bytes.
pub fn read_string(body: &[u8]) -> Result<(String, &[u8]), Error> {
    let len = read_u64(body).map_err(|e| Error::InvalidRequest(e.to_string()))? as usize;
    let rest = &body[8..];
    if rest.len() < len {
        return Err(Error::InvalidRequest("length-prefixed field truncated".into()));
    }
    let value = std::str::from_utf8(&rest[..len])
        .map_err(|_| Error::InvalidRequest("field was not valid UTF-8".into()))?
        .to_owned();
    Ok((value, &rest[len..]))
}

pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_u64(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

/// `[group_len:8][group][addr_len:8][addr]` — the response shared by
/// `QUERY_STORAGE_FOR_UPLOAD` and `QUERY_STORAGE_FOR_FETCH`.
pub fn encode_storage_answer(group: &str, addr: std::net::SocketAddr) -> Vec<u8> {
    let mut out = Vec::new();
    write_string(&mut out, group);
    write_string(&mut out, &addr.to_string());
    out
}

pub fn state_byte(state: NodeState) -> u8 {
    match state {
        NodeState::Active => 0,
        NodeState::Offline => 1,
    }
}
