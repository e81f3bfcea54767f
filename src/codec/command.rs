//! Command discriminants carried in byte 9 of every frame header.
//!
//! Numeric values are fixed by the on-the-wire protocol and must match
//! byte-for-byte; they are not renumbered for tidiness.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Storage-side and tracker-side command codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum Command {
    Upload = 11,
    Delete = 12,
    SetMetadata = 13,
    Download = 14,
    GetMetadata = 15,
    UploadSlave = 21,
    QueryFileInfo = 22,
    UploadAppender = 23,
    Append = 24,
    Modify = 34,
    Truncate = 36,
    QueryStorageForUpload = 101,
    QueryStorageForFetch = 102,
    ListOneGroup = 105,
}

impl Command {
    /// Decodes a raw command byte, if it names a known command.
    pub fn from_byte(byte: u8) -> Option<Self> {
        FromPrimitive::from_u8(byte)
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
