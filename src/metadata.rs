//! Metadata file format and overwrite/merge semantics.
//!
//! Metadata for `<basename>` lives in a sibling file `<basename>-m`. Entries
//! are separated by `0x02`; within an entry, key and value are separated by
//! `0x01`. There is no trailing separator; an empty mapping is an empty file.

use std::collections::BTreeMap;
use thiserror::Error;

pub const KEY_SEPARATOR: u8 = 0x01;
pub const ENTRY_SEPARATOR: u8 = 0x02;

pub const MAX_KEY_LEN: usize = 64;
pub const MAX_VALUE_LEN: usize = 256;

/// How a `SET_METADATA` request combines with any existing metadata.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the entire existing set.
    Overwrite,
    /// Union with the existing set; keys in the new set win on conflict.
    Merge,
}

impl SetMode {
    /// Decodes the single-byte wire flag ('O' = overwrite, 'M' = merge).
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            b'O' => Some(SetMode::Overwrite),
            b'M' => Some(SetMode::Merge),
            _ => None,
        }
    }

    pub fn to_flag(self) -> u8 {
        match self {
            SetMode::Overwrite => b'O',
            SetMode::Merge => b'M',
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata key longer than {MAX_KEY_LEN} bytes")]
    KeyTooLong,
    #[error("metadata value longer than {MAX_VALUE_LEN} bytes")]
    ValueTooLong,
    #[error("metadata entry missing key/value separator")]
    MissingSeparator,
    #[error("metadata bytes were not valid UTF-8")]
    NotUtf8,
}

/// A metadata key/value mapping (keys unique).
pub type Metadata = BTreeMap<String, String>;

/// Validates key/value lengths before admitting a set.
pub fn validate(map: &Metadata) -> Result<(), MetadataError> {
    for (key, value) in map {
        if key.len() > MAX_KEY_LEN {
            return Err(MetadataError::KeyTooLong);
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(MetadataError::ValueTooLong);
        }
    }
    Ok(())
}

/// Serializes a metadata mapping to the on-disk `-m` file format.
pub fn serialize(map: &Metadata) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(ENTRY_SEPARATOR);
        }
        out.extend_from_slice(key.as_bytes());
        out.push(KEY_SEPARATOR);
        out.extend_from_slice(value.as_bytes());
    }
    out
}

/// Parses the on-disk `-m` file format back into a mapping.
pub fn parse(bytes: &[u8]) -> Result<Metadata, MetadataError> {
    let mut map = Metadata::new();
    if bytes.is_empty() {
        return Ok(map);
    }
    for entry in bytes.split(|&b| b == ENTRY_SEPARATOR) {
        let sep = entry.iter().position(|&b| b == KEY_SEPARATOR).ok_or(MetadataError::MissingSeparator)?;
        let key = std::str::from_utf8(&entry[..sep]).map_err(|_| MetadataError::NotUtf8)?;
        let value = std::str::from_utf8(&entry[sep + 1..]).map_err(|_| MetadataError::NotUtf8)?;
        map.insert(key.to_owned(), value.to_owned());
    }
    Ok(map)
}

/// Applies `incoming` to `existing` according to `mode`: overwrite is total,
/// merge is a union with `incoming` winning conflicts.
pub fn apply(existing: Metadata, incoming: Metadata, mode: SetMode) -> Metadata {
    match mode {
        SetMode::Overwrite => incoming,
        SetMode::Merge => {
            let mut merged = existing;
            merged.extend(incoming);
            merged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn empty_mapping_serializes_to_empty_bytes() {
        assert!(serialize(&Metadata::new()).is_empty());
        assert_eq!(parse(&[]).unwrap(), Metadata::new());
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let m = map(&[("a", "1"), ("b", "2")]);
        let bytes = serialize(&m);
        assert_eq!(parse(&bytes).unwrap(), m);
    }

    #[test]
    fn overwrite_replaces_entire_set() {
        let existing = map(&[("a", "1"), ("b", "2")]);
        let incoming = map(&[("c", "3")]);
        assert_eq!(apply(existing, incoming.clone(), SetMode::Overwrite), incoming);
    }

    #[test]
    fn merge_is_union_with_incoming_winning_conflicts() {
        let existing = map(&[("a", "1"), ("b", "2")]);
        let incoming = map(&[("b", "3"), ("c", "4")]);
        let merged = apply(existing, incoming, SetMode::Merge);
        assert_eq!(merged, map(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[test]
    fn rejects_oversize_key() {
        let long_key = "k".repeat(MAX_KEY_LEN + 1);
        let m = map(&[(long_key.as_str(), "v")]);
        assert_eq!(validate(&m), Err(MetadataError::KeyTooLong));
    }
}
