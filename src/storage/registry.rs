//! In-memory index from file-id to on-disk location and bookkeeping data.
//!
//! The two-level directory in a rendered file-id is a deterministic hash of
//! the basename (`fileid::two_level_dir`), so a standalone file's path is
//! always recoverable without a lookup. A trunk-packed file's location
//! (`trunk_id`, `offset`, `slot_size`) is not recoverable from the
//! identifier alone, so this registry is the source of truth for it: an
//! in-process map, durable only for the process lifetime — acceptable
//! since this crate does not implement a storage-node restart/rebuild-index
//! path.

use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::metadata::Metadata;
use crate::trunk::{SlotFileType, TrunkInfo};

#[derive(Debug, Clone)]
pub enum FileLocation {
    /// Lives at `<store_path_root>/<relative_path>`.
    Standalone { relative_path: std::path::PathBuf },
    /// Packed into a trunk file slot.
    Trunked { info: TrunkInfo },
    /// A [`SlotFileType::Link`] record: no on-disk bytes of its own, just a
    /// pointer to another rendered file-id.
    Link { target_file_id: String },
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub store_path_index: u8,
    pub location: FileLocation,
    pub kind: SlotFileType,
    pub file_size: u64,
    pub crc32: u32,
    pub create_unix_time: u64,
    pub metadata: Metadata,
    /// Present only for [`SlotFileType::Slave`] records: the master's
    /// rendered file-id.
    pub master_file_id: Option<String>,
}

impl FileRecord {
    pub fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
    }
}

/// Maps a rendered file-id to its [`FileRecord`].
#[derive(Default)]
pub struct Registry {
    files: DashMap<String, FileRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { files: DashMap::new() }
    }

    pub fn insert(&self, file_id: String, record: FileRecord) {
        self.files.insert(file_id, record);
    }

    pub fn get(&self, file_id: &str) -> Option<FileRecord> {
        self.files.get(file_id).map(|r| r.clone())
    }

    pub fn remove(&self, file_id: &str) -> Option<FileRecord> {
        self.files.remove(file_id).map(|(_, r)| r)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    pub fn update_metadata(&self, file_id: &str, metadata: Metadata) -> bool {
        if let Some(mut entry) = self.files.get_mut(file_id) {
            entry.metadata = metadata;
            true
        } else {
            false
        }
    }

    pub fn update_size(&self, file_id: &str, file_size: u64) -> bool {
        if let Some(mut entry) = self.files.get_mut(file_id) {
            entry.file_size = file_size;
            true
        } else {
            false
        }
    }

    /// Whether some other record's [`FileLocation::Link`] points at
    /// `file_id`. Deleting a file still referenced this way would leave a
    /// dangling link behind.
    pub fn is_link_target(&self, file_id: &str) -> bool {
        self.files.iter().any(|entry| matches!(&entry.location, FileLocation::Link { target_file_id } if target_file_id == file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let registry = Registry::new();
        registry.insert(
            "group1/00aabb/xyz.txt".into(),
            FileRecord {
                store_path_index: 0,
                location: FileLocation::Standalone { relative_path: "aa/bb/xyz.txt".into() },
                kind: SlotFileType::Normal,
                file_size: 10,
                crc32: 0,
                create_unix_time: FileRecord::now(),
                metadata: Metadata::new(),
                master_file_id: None,
            },
        );
        assert!(registry.contains("group1/00aabb/xyz.txt"));
        assert_eq!(registry.get("group1/00aabb/xyz.txt").unwrap().file_size, 10);
    }

    #[test]
    fn remove_drops_entry() {
        let registry = Registry::new();
        registry.insert(
            "a".into(),
            FileRecord {
                store_path_index: 0,
                location: FileLocation::Standalone { relative_path: "a".into() },
                kind: SlotFileType::Normal,
                file_size: 0,
                crc32: 0,
                create_unix_time: 0,
                metadata: Metadata::new(),
                master_file_id: None,
            },
        );
        assert!(registry.remove("a").is_some());
        assert!(!registry.contains("a"));
    }
}
