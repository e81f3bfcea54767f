//! Fixed-width field helpers for command bodies.
//!
//! Strings in bodies are NUL- or space-padded to a declared width; integers
//! are big-endian unsigned, 8 bytes unless a narrower width is named.

use byteorder::{BigEndian, ByteOrder};

use super::FrameError;

/// Reads a big-endian `u64` from the front of `buf`.
pub fn read_u64(buf: &[u8]) -> Result<u64, FrameError> {
    if buf.len() < 8 {
        return Err(FrameError::MissingField("u64 field"));
    }
    Ok(BigEndian::read_u64(&buf[..8]))
}

/// Reads a big-endian `u32` from the front of `buf`.
pub fn read_u32(buf: &[u8]) -> Result<u32, FrameError> {
    if buf.len() < 4 {
        return Err(FrameError::MissingField("u32 field"));
    }
    Ok(BigEndian::read_u32(&buf[..4]))
}

pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    out.extend_from_slice(&buf);
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Reads a fixed-width, NUL/space-padded ASCII field and trims the padding.
///
/// Fails with [`FrameError::UnterminatedString`] if `buf` is shorter than
/// `width`; a field that fills the entire width with no padding byte is
/// accepted as-is (the original protocol does not require a guaranteed
/// terminator when the value exactly fills the field).
pub fn read_fixed_str(buf: &[u8], width: usize) -> Result<String, FrameError> {
    if buf.len() < width {
        return Err(FrameError::UnterminatedString);
    }
    let field = &buf[..width];
    let end = field.iter().position(|&b| b == 0 || b == b' ').unwrap_or(width);
    String::from_utf8(field[..end].to_vec()).map_err(|_| FrameError::UnterminatedString)
}

/// Writes `value` into a fixed-width field, padding with NUL bytes.
///
/// Fails with [`FrameError::MissingField`] if `value` does not fit.
pub fn write_fixed_str(out: &mut Vec<u8>, value: &str, width: usize) -> Result<(), FrameError> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(FrameError::MissingField("fixed string field too long"));
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + (width - bytes.len()), 0);
    Ok(())
}

/// Width, in bytes, of each fixed-width field in a command body.
pub mod width {
    pub const GROUP_NAME: usize = 16;
    pub const IP_ADDRESS: usize = 16;
    pub const FILENAME_PREFIX: usize = 16;
    pub const FORMATTED_EXT: usize = 6;
    pub const METADATA_FLAG: usize = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_str_round_trips() {
        let mut buf = Vec::new();
        write_fixed_str(&mut buf, "group1", width::GROUP_NAME).unwrap();
        assert_eq!(buf.len(), width::GROUP_NAME);
        assert_eq!(read_fixed_str(&buf, width::GROUP_NAME).unwrap(), "group1");
    }

    #[test]
    fn fixed_str_rejects_oversize_value() {
        let mut buf = Vec::new();
        let err = write_fixed_str(&mut buf, "this-name-is-far-too-long", width::GROUP_NAME)
            .unwrap_err();
        assert!(matches!(err, FrameError::MissingField(_)));
    }

    #[test]
    fn u64_round_trips() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(read_u64(&buf).unwrap(), 0x0102_0304_0506_0708);
    }
}
