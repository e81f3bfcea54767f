//! Per-store-path throughput counters, surfaced to `tracing` and to the
//! tracker heartbeat's disk-usage fields.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct DiskCounters {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl DiskCounters {
    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = DiskCounters::default();
        counters.record_read(10);
        counters.record_write(20);
        counters.record_read(5);
        assert_eq!(counters.bytes_read(), 15);
        assert_eq!(counters.bytes_written(), 20);
        assert_eq!(counters.reads(), 2);
        assert_eq!(counters.writes(), 1);
    }
}
