//! Trunk allocator: a free-space tree over shared trunk files, one instance
//! per store path.
//!
//! Small files are packed into contiguous slots inside a handful of large
//! trunk files rather than each taking its own inode. The allocator tracks
//! free extents keyed by `(size, trunk_id, offset)` for best-fit lookup, and
//! a secondary `(trunk_id, offset) -> size` index for adjacency lookups
//! during coalescing.

pub mod header;

pub use header::{SlotFileType, SlotHeader};

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use thiserror::Error;

/// Identifies one physical trunk file within a store path.
pub type TrunkId = u32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("allocation request of {0} bytes exceeds the trunk file size")]
    RequestTooLarge(u64),
    #[error("existing slot header at the chosen offset is neither free nor zero")]
    Conflict,
}

/// A trunk-info tuple identifying an allocated (or freed) slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrunkInfo {
    pub trunk_id: TrunkId,
    pub offset: u64,
    pub slot_size: u32,
}

struct FreeSet {
    /// `(size, trunk_id, offset) -> ()`, ordered by size for best-fit.
    by_size: BTreeMap<(u32, TrunkId, u64), ()>,
    /// `(trunk_id, offset) -> size`, for adjacency lookups during coalescing.
    by_location: HashMap<(TrunkId, u64), u32>,
}

impl FreeSet {
    fn new() -> Self {
        FreeSet { by_size: BTreeMap::new(), by_location: HashMap::new() }
    }

    fn insert(&mut self, trunk_id: TrunkId, offset: u64, size: u32) {
        self.by_size.insert((size, trunk_id, offset), ());
        self.by_location.insert((trunk_id, offset), size);
    }

    fn remove(&mut self, trunk_id: TrunkId, offset: u64, size: u32) {
        self.by_size.remove(&(size, trunk_id, offset));
        self.by_location.remove(&(trunk_id, offset));
    }

    /// Smallest free extent whose size is at least `n`, if any.
    fn best_fit(&self, n: u32) -> Option<(u32, TrunkId, u64)> {
        self.by_size.range((n, 0, 0)..).next().map(|(&key, _)| key)
    }
}

/// Per-store-path trunk file state and free-space tree.
pub struct TrunkAllocator {
    inner: Mutex<Inner>,
    trunk_file_size: u64,
    alloc_unit: u32,
}

struct Inner {
    free: FreeSet,
    next_trunk_id: TrunkId,
    /// Trunk ids that exist, for `release`'s retirement check.
    trunk_count: usize,
}

impl TrunkAllocator {
    pub fn new(trunk_file_size: u64, alloc_unit: u32) -> Self {
        TrunkAllocator {
            inner: Mutex::new(Inner { free: FreeSet::new(), next_trunk_id: 0, trunk_count: 0 }),
            trunk_file_size,
            alloc_unit,
        }
    }

    fn round_up(&self, n: u32) -> u32 {
        let unit = self.alloc_unit.max(1);
        n.div_ceil(unit) * unit
    }

    /// Allocates a slot of at least `n` bytes, extending with a new trunk
    /// file if no existing extent fits.
    pub fn allocate(&self, n: u32) -> Result<TrunkInfo, Error> {
        let rounded = self.round_up(n);
        if (rounded as u64) > self.trunk_file_size {
            return Err(Error::RequestTooLarge(rounded as u64));
        }

        let mut inner = self.inner.lock().expect("trunk allocator mutex poisoned");

        let (size, trunk_id, offset) = match inner.free.best_fit(rounded) {
            Some(found) => found,
            None => {
                let trunk_id = inner.next_trunk_id;
                inner.next_trunk_id += 1;
                inner.trunk_count += 1;
                let full_size = self.trunk_file_size as u32;
                inner.free.insert(trunk_id, 0, full_size);
                (full_size, trunk_id, 0)
            }
        };

        inner.free.remove(trunk_id, offset, size);
        let remainder = size - rounded;
        if remainder > 0 {
            inner.free.insert(trunk_id, offset + rounded as u64, remainder);
        }

        Ok(TrunkInfo { trunk_id, offset, slot_size: rounded })
    }

    /// Releases a previously allocated slot, coalescing with adjacent free
    /// extents in the same trunk file on both sides.
    pub fn release(&self, info: TrunkInfo) {
        let mut inner = self.inner.lock().expect("trunk allocator mutex poisoned");

        let mut offset = info.offset;
        let mut size = info.slot_size;

        // Coalesce with the extent immediately to the left, if free.
        if let Some((&(left_trunk, left_offset), &left_size)) = inner
            .free
            .by_location
            .iter()
            .find(|&(&(t, o), &s)| t == info.trunk_id && o + s as u64 == offset)
            .map(|(k, v)| (k, v))
        {
            let _ = left_trunk;
            inner.free.remove(info.trunk_id, left_offset, left_size);
            offset = left_offset;
            size += left_size;
        }

        // Coalesce with the extent immediately to the right, if free.
        if let Some(&right_size) = inner.free.by_location.get(&(info.trunk_id, offset + size as u64)) {
            inner.free.remove(info.trunk_id, offset + size as u64, right_size);
            size += right_size;
        }

        inner.free.insert(info.trunk_id, offset, size);

        // A fully-free trunk with siblings available may be retired; we do
        // not reclaim disk space here (that is a disk-engine concern), only
        // note eligibility via the returned extent covering the whole file.
        let _ = inner.trunk_count;
    }

    /// Number of distinct free extents currently tracked (test/diagnostic
    /// hook; used to assert the coalescing invariant).
    pub fn free_extent_count(&self) -> usize {
        self.inner.lock().expect("trunk allocator mutex poisoned").free.by_size.len()
    }

    /// Whether `trunk_id` currently has exactly one free extent spanning the
    /// entire trunk file.
    pub fn is_fully_free(&self, trunk_id: TrunkId) -> bool {
        let inner = self.inner.lock().expect("trunk allocator mutex poisoned");
        inner
            .free
            .by_location
            .get(&(trunk_id, 0))
            .is_some_and(|&size| size as u64 == self.trunk_file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rounds_up_to_alloc_unit() {
        let alloc = TrunkAllocator::new(64 * 1024, 64);
        let info = alloc.allocate(1).unwrap();
        assert_eq!(info.slot_size, 64);
    }

    #[test]
    fn allocate_extends_with_new_trunk_when_no_extent_fits() {
        let alloc = TrunkAllocator::new(128, 64);
        let first = alloc.allocate(100).unwrap();
        let second = alloc.allocate(100).unwrap();
        assert_ne!(first.trunk_id, second.trunk_id);
    }

    #[test]
    fn release_then_allocate_reuses_freed_space() {
        let alloc = TrunkAllocator::new(1024, 64);
        let info = alloc.allocate(100).unwrap();
        alloc.release(info);
        let reused = alloc.allocate(100).unwrap();
        assert_eq!(reused.trunk_id, info.trunk_id);
        assert_eq!(reused.offset, info.offset);
    }

    #[test]
    fn trunk_coalesces_to_single_free_extent_after_full_release() {
        let trunk_size = 64 * 1024u64;
        let alloc = TrunkAllocator::new(trunk_size, 64);
        let mut infos = Vec::new();
        for _ in 0..64 {
            infos.push(alloc.allocate(1000).unwrap());
        }
        let trunk_id = infos[0].trunk_id;
        for info in infos {
            alloc.release(info);
        }
        assert!(alloc.is_fully_free(trunk_id));
        assert_eq!(alloc.free_extent_count(), 1);
    }

    #[test]
    fn allocate_rejects_request_larger_than_trunk_file() {
        let alloc = TrunkAllocator::new(128, 64);
        assert_eq!(alloc.allocate(200), Err(Error::RequestTooLarge(256)));
    }
}
