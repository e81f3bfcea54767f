//! On-disk slot header prefixing every packed file inside a trunk file
//!: 24 bytes, little-endian, distinct from the wire codec's
//! big-endian header since it never crosses the network.

pub const SLOT_HEADER_LEN: usize = 24;

const FORMATTED_EXT_LEN: usize = 7;

/// File kind tag stored in the slot header, mirroring the file-kind
/// discriminant used elsewhere in the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotFileType {
    Normal,
    Appender,
    Slave,
    Link,
}

impl SlotFileType {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SlotFileType::Normal),
            1 => Some(SlotFileType::Appender),
            2 => Some(SlotFileType::Slave),
            3 => Some(SlotFileType::Link),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            SlotFileType::Normal => 0,
            SlotFileType::Appender => 1,
            SlotFileType::Slave => 2,
            SlotFileType::Link => 3,
        }
    }
}

/// The fixed header stored at the start of every slot:
/// `alloc_size:4 | file_size:4 | crc32:4 | mtime:4 | file_type:1 | formatted_ext:7`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlotHeader {
    pub alloc_size: u32,
    pub file_size: u32,
    pub crc32: u32,
    pub mtime: u32,
    pub file_type: SlotFileType,
    pub formatted_ext: [u8; FORMATTED_EXT_LEN],
}

impl SlotHeader {
    pub fn encode(self) -> [u8; SLOT_HEADER_LEN] {
        let mut buf = [0u8; SLOT_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.alloc_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.crc32.to_le_bytes());
        buf[12..16].copy_from_slice(&self.mtime.to_le_bytes());
        buf[16] = self.file_type.as_byte();
        buf[17..24].copy_from_slice(&self.formatted_ext);
        buf
    }

    pub fn decode(buf: &[u8; SLOT_HEADER_LEN]) -> Option<Self> {
        let file_type = SlotFileType::from_byte(buf[16])?;
        Some(SlotHeader {
            alloc_size: u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes")),
            file_size: u32::from_le_bytes(buf[4..8].try_into().expect("4 bytes")),
            crc32: u32::from_le_bytes(buf[8..12].try_into().expect("4 bytes")),
            mtime: u32::from_le_bytes(buf[12..16].try_into().expect("4 bytes")),
            file_type,
            formatted_ext: buf[17..24].try_into().expect("7 bytes"),
        })
    }

    /// A header whose `alloc_size`/`file_size` are both zero, written over a
    /// freed slot so a stale reader sees it as empty rather than stale data.
    pub fn zeroed() -> Self {
        SlotHeader {
            alloc_size: 0,
            file_size: 0,
            crc32: 0,
            mtime: 0,
            file_type: SlotFileType::Normal,
            formatted_ext: [0u8; FORMATTED_EXT_LEN],
        }
    }

    /// Whether this header occupies a live slot vs. a released/untouched one.
    pub fn is_occupied(&self) -> bool {
        self.alloc_size != 0
    }

    pub fn ext_str(&self) -> String {
        let end = self.formatted_ext.iter().position(|&b| b == 0).unwrap_or(FORMATTED_EXT_LEN);
        String::from_utf8_lossy(&self.formatted_ext[..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = SlotHeader {
            alloc_size: 4096,
            file_size: 1234,
            crc32: 0xdead_beef,
            mtime: 1_700_000_000,
            file_type: SlotFileType::Appender,
            formatted_ext: *b"jpg\0\0\0\0",
        };
        let decoded = SlotHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.ext_str(), "jpg");
    }

    #[test]
    fn zeroed_header_is_not_occupied() {
        assert!(!SlotHeader::zeroed().is_occupied());
    }

    #[test]
    fn decode_rejects_unknown_file_type() {
        let mut buf = [0u8; SLOT_HEADER_LEN];
        buf[16] = 99;
        assert!(SlotHeader::decode(&buf).is_none());
    }
}
