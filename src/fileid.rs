//! File identifier construction and parsing.
//!
//! A file-id is `<group>/<store-path-index><two-level-dir>/<basename>.<ext>`.
//! `<basename>` is URL-safe, unpadded base64 over a 16-byte
//! [`BasenameFields`] struct (big-endian integers throughout, for a
//! stable cross-platform encoding).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::net::Ipv4Addr;
use thiserror::Error;

/// The 16 raw bytes encoded into a file's basename.
///
/// Layout is fixed so identifiers remain stable across implementations:
/// `upload_timestamp: u32 BE | crc32: u32 BE | source_ip: u32 BE | random: u32 BE`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BasenameFields {
    pub upload_timestamp: u32,
    pub crc32: u32,
    pub source_ip: u32,
    pub random: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileIdError {
    #[error("file-id is missing the '/' separating group from path")]
    MissingGroupSeparator,
    #[error("file-id path has no two-level directory")]
    MissingStoreDir,
    #[error("basename did not decode to exactly 16 bytes")]
    BadBasenameLength,
    #[error("basename was not valid base64: {0}")]
    BadBase64(String),
}

impl BasenameFields {
    pub fn encode(self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&self.upload_timestamp.to_be_bytes());
        buf[4..8].copy_from_slice(&self.crc32.to_be_bytes());
        buf[8..12].copy_from_slice(&self.source_ip.to_be_bytes());
        buf[12..16].copy_from_slice(&self.random.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; 16]) -> Self {
        BasenameFields {
            upload_timestamp: u32::from_be_bytes(buf[0..4].try_into().expect("4 bytes")),
            crc32: u32::from_be_bytes(buf[4..8].try_into().expect("4 bytes")),
            source_ip: u32::from_be_bytes(buf[8..12].try_into().expect("4 bytes")),
            random: u32::from_be_bytes(buf[12..16].try_into().expect("4 bytes")),
        }
    }

    /// Packs `ip` into the big-endian 32-bit field. IPv6 sources fold to a
    /// 32-bit hash: the field only needs to be a stable, opaque
    /// discriminator, not a routable address.
    pub fn pack_source_ip(ip: std::net::IpAddr) -> u32 {
        match ip {
            std::net::IpAddr::V4(v4) => u32::from(v4),
            std::net::IpAddr::V6(v6) => {
                let octets = v6.octets();
                let mut hash: u32 = 0x811c_9dc5;
                for chunk in octets.chunks(4) {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    hash ^= u32::from_be_bytes(word);
                    hash = hash.wrapping_mul(0x0100_0193);
                }
                hash
            }
        }
    }

    pub fn source_ip_v4(self) -> Ipv4Addr {
        Ipv4Addr::from(self.source_ip)
    }
}

/// Encodes `fields` as a URL-safe, unpadded base64 basename (no extension).
pub fn encode_basename(fields: BasenameFields) -> String {
    URL_SAFE_NO_PAD.encode(fields.encode())
}

/// Decodes a basename (without extension) back into its 16-byte fields.
pub fn decode_basename(basename: &str) -> Result<BasenameFields, FileIdError> {
    let raw = URL_SAFE_NO_PAD
        .decode(basename)
        .map_err(|e| FileIdError::BadBase64(e.to_string()))?;
    let raw: [u8; 16] = raw.try_into().map_err(|_| FileIdError::BadBasenameLength)?;
    Ok(BasenameFields::decode(&raw))
}

/// A fully parsed file identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileId {
    pub group: String,
    pub store_path_index: u8,
    pub dir1: String,
    pub dir2: String,
    pub basename: String,
    pub ext: String,
}

impl FileId {
    /// Builds a new file-id for a freshly uploaded file.
    pub fn new(
        group: &str,
        store_path_index: u8,
        fields: BasenameFields,
        ext: &str,
    ) -> Self {
        let basename = encode_basename(fields);
        let (dir1, dir2) = two_level_dir(&basename);
        FileId {
            group: group.to_owned(),
            store_path_index,
            dir1,
            dir2,
            basename,
            ext: ext.to_owned(),
        }
    }

    /// Renders the canonical printable-ASCII file-id token.
    pub fn render(&self) -> String {
        if self.ext.is_empty() {
            format!(
                "{}/{:02x}{}/{}",
                self.group, self.store_path_index, self.dir1_dir2(), self.basename
            )
        } else {
            format!(
                "{}/{:02x}{}/{}.{}",
                self.group,
                self.store_path_index,
                self.dir1_dir2(),
                self.basename,
                self.ext
            )
        }
    }

    fn dir1_dir2(&self) -> String {
        format!("{}/{}", self.dir1, self.dir2)
    }

    /// Parses a file-id token produced by [`FileId::render`].
    pub fn parse(token: &str) -> Result<Self, FileIdError> {
        let (group, rest) = token.split_once('/').ok_or(FileIdError::MissingGroupSeparator)?;
        let mut parts = rest.splitn(3, '/');
        let path_field = parts.next().ok_or(FileIdError::MissingStoreDir)?;
        let dir2 = parts.next().ok_or(FileIdError::MissingStoreDir)?;
        let filename = parts.next().ok_or(FileIdError::MissingStoreDir)?;

        if path_field.len() < 2 {
            return Err(FileIdError::MissingStoreDir);
        }
        let store_path_index = u8::from_str_radix(&path_field[..2], 16).unwrap_or(0);
        let dir1 = path_field[2..].to_owned();

        let (basename, ext) = match filename.split_once('.') {
            Some((b, e)) => (b.to_owned(), e.to_owned()),
            None => (filename.to_owned(), String::new()),
        };

        Ok(FileId { group: group.to_owned(), store_path_index, dir1, dir2: dir2.to_owned(), basename, ext })
    }

    /// The 16-byte decoded fields embedded in this id's basename.
    pub fn fields(&self) -> Result<BasenameFields, FileIdError> {
        decode_basename(&self.basename)
    }

    /// The basename of a slave file derived from this (master) file-id and
    /// a prefix.
    pub fn slave_basename(&self, prefix: &str) -> String {
        format!("{}{}", self.basename, prefix)
    }
}

/// Derives the stable two-level hex directory pair from a basename, used
/// to spread files across subdirectories of a store path.
pub fn two_level_dir(basename: &str) -> (String, String) {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in basename.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let dir1 = (hash & 0xff) as u8;
    let dir2 = ((hash >> 8) & 0xff) as u8;
    (format!("{:02x}", dir1), format!("{:02x}", dir2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> BasenameFields {
        BasenameFields {
            upload_timestamp: 0x6123_4567,
            crc32: 0x3610_A686,
            source_ip: u32::from(Ipv4Addr::new(10, 0, 0, 1)),
            random: 0xdead_beef,
        }
    }

    #[test]
    fn basename_round_trips() {
        let fields = sample_fields();
        let encoded = encode_basename(fields);
        assert!(!encoded.contains('='), "must be unpadded base64");
        let decoded = decode_basename(&encoded).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn file_id_round_trips_through_render_and_parse() {
        let id = FileId::new("group1", 0, sample_fields(), "txt");
        let rendered = id.render();
        let parsed = FileId::parse(&rendered).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.fields().unwrap(), sample_fields());
    }

    #[test]
    fn two_uploads_never_collide_with_distinct_random_fields() {
        let a = FileId::new("group1", 0, sample_fields(), "txt");
        let mut other_fields = sample_fields();
        other_fields.random = other_fields.random.wrapping_add(1);
        let b = FileId::new("group1", 0, other_fields, "txt");
        assert_ne!(a.render(), b.render());
    }

    #[test]
    fn slave_basename_inserts_prefix_before_extension() {
        let master = FileId::new("group1", 0, sample_fields(), "jpg");
        let slave_basename = master.slave_basename("_thumb");
        assert!(slave_basename.starts_with(&master.basename));
        assert!(slave_basename.ends_with("_thumb"));
    }
}
