//! Wire codec: the fixed 10-byte packet header and body framing shared by
//! every command.
//!
//! ```text
//! [body_len: u64 BE][command: u8][status: u8][body: body_len bytes]
//! ```

pub mod command;
pub mod primitive;

pub use command::Command;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Number of bytes in a packet header.
pub const HEADER_LEN: usize = 10;

/// Upper bound on a single frame's body, independent of any
/// command-specific `max_upload_bytes`; guards against a corrupt or
/// hostile peer claiming an unbounded body length.
pub const MAX_BODY_LEN: u64 = 2 * 1024 * 1024 * 1024;

/// Codec failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("body length {0} exceeds the per-command maximum")]
    BodyTooLarge(u64),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("fixed-width string field was not terminated within its declared width")]
    UnterminatedString,
    #[error("unknown command byte {0}")]
    UnknownCommand(u8),
}

/// A decoded frame header plus its still-unread body.
#[derive(Debug, Copy, Clone)]
pub struct Header {
    pub body_len: u64,
    pub command: Command,
    pub status: u8,
}

impl Header {
    pub fn encode(self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..8].copy_from_slice(&self.body_len.to_be_bytes());
        buf[8] = self.command.as_byte();
        buf[9] = self.status;
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        let body_len = u64::from_be_bytes(buf[..8].try_into().expect("8-byte slice"));
        if body_len > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLarge(body_len));
        }
        let command = Command::from_byte(buf[8]).ok_or(FrameError::UnknownCommand(buf[8]))?;
        Ok(Header { body_len, command, status: buf[9] })
    }
}

/// Encodes a full frame (header + body) into a single buffer.
pub fn encode(command: Command, status: u8, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.len() as u64 > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge(body.len() as u64));
    }
    let header = Header { body_len: body.len() as u64, command, status };
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Writes a full frame to an async sink.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: Command,
    status: u8,
    body: &[u8],
) -> std::io::Result<()> {
    let frame = encode(command, status, body)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    writer.write_all(&frame).await
}

/// Reads and decodes the next header from an async source.
pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Header> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).await?;
    Header::decode(&buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

/// Reads exactly `header.body_len` bytes following a header already read
/// via [`read_header`].
pub async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    header: &Header,
) -> std::io::Result<Vec<u8>> {
    let mut body = vec![0u8; header.body_len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Reads a full frame (header + body) from an async source.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<(Header, Vec<u8>)> {
    let header = read_header(reader).await?;
    let body = read_body(reader, &header).await?;
    Ok((header, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encodes_and_decodes_round_trip() {
        let body = b"hello world";
        let mut buf = Vec::new();
        write_frame(&mut buf, Command::Upload, 0, body).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (header, decoded_body) = read_frame(&mut cursor).await.unwrap();
        assert_eq!(header.command, Command::Upload);
        assert_eq!(header.status, 0);
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn decode_rejects_unknown_command() {
        let mut raw = [0u8; HEADER_LEN];
        raw[..8].copy_from_slice(&0u64.to_be_bytes());
        raw[8] = 255;
        raw[9] = 0;
        assert_eq!(Header::decode(&raw), Err(FrameError::UnknownCommand(255)));
    }

    #[test]
    fn decode_rejects_oversize_body() {
        let mut raw = [0u8; HEADER_LEN];
        raw[..8].copy_from_slice(&(MAX_BODY_LEN + 1).to_be_bytes());
        raw[8] = Command::Upload.as_byte();
        assert!(matches!(Header::decode(&raw), Err(FrameError::BodyTooLarge(_))));
    }

    #[tokio::test]
    async fn read_header_surfaces_eof_on_truncated_stream() {
        let mut cursor = std::io::Cursor::new(vec![0u8; 4]);
        let err = read_header(&mut cursor).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
