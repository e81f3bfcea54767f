//! Disk-I/O engine: a fixed pool of blocking worker threads per store path
//!.
//!
//! The network reactor is async; disk I/O is blocking `std::fs` work. Each
//! store path owns `reader_count + writer_count` OS threads, each draining
//! its own FIFO queue. Tasks are routed to a worker by hashing the owning
//! connection id, so all tasks from one connection land on the same worker
//! and execute in submission order.

mod counters;
mod task;
mod worker;

pub use counters::DiskCounters;
pub use task::{
    AppendPayload, DeletePayload, DiskOutcome, DiskTask, ModifyPayload, ReadPayload, ReadRangePayload, TaskKind,
    TruncatePayload, WritePayload, WriteTrunkSlotPayload,
};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::trunk::TrunkAllocator;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found")]
    NotFound,
    #[error("store path has no space for this allocation")]
    NoSpace,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("existing data at the target location does not match the expected state")]
    Conflict,
}

impl From<crate::trunk::Error> for Error {
    fn from(e: crate::trunk::Error) -> Self {
        match e {
            crate::trunk::Error::RequestTooLarge(_) => Error::NoSpace,
            crate::trunk::Error::Conflict => Error::Conflict,
        }
    }
}

/// One store path's worker pool plus its trunk allocator.
///
/// When `separate_read_write` is set, readers and writers are steered to
/// disjoint sub-pools so a backlog of large reads never delays a write
/// (and vice versa). Otherwise both share one combined pool, matching the
/// total thread count either way.
pub struct StorePath {
    pub index: u8,
    pub root: PathBuf,
    pub trunks: Arc<TrunkAllocator>,
    reader_senders: Vec<async_channel::Sender<DiskTask>>,
    writer_senders: Vec<async_channel::Sender<DiskTask>>,
    total_workers: usize,
    counters: Arc<DiskCounters>,
}

impl StorePath {
    /// Spawns `reader_count + writer_count` blocking worker threads, each
    /// backed by its own bounded async-channel queue.
    pub fn spawn(
        index: u8,
        root: PathBuf,
        reader_count: usize,
        writer_count: usize,
        trunk_file_size: u64,
        alloc_unit: u32,
        separate_read_write: bool,
    ) -> Self {
        let trunks = Arc::new(TrunkAllocator::new(trunk_file_size, alloc_unit));
        let counters = Arc::new(DiskCounters::default());
        let reader_count = reader_count.max(1);
        let writer_count = writer_count.max(1);
        let total_workers = reader_count + writer_count;

        let (reader_senders, writer_senders) = if separate_read_write {
            let readers = spawn_workers(index, "reader", reader_count, &root, &counters);
            let writers = spawn_workers(index, "writer", writer_count, &root, &counters);
            (readers, writers)
        } else {
            let combined = spawn_workers(index, "worker", total_workers, &root, &counters);
            (combined.clone(), combined)
        };

        StorePath { index, root, trunks, reader_senders, writer_senders, total_workers, counters }
    }

    /// Number of worker threads backing this store path.
    pub fn worker_count(&self) -> usize {
        self.total_workers
    }

    /// Routes `task` to the worker owning `connection_id` within the
    /// sub-pool matching its read/write nature, preserving per-connection
    /// FIFO ordering within that sub-pool.
    pub async fn submit(&self, connection_id: u64, task: DiskTask) -> Result<(), Error> {
        let senders = if is_read(&task.kind) { &self.reader_senders } else { &self.writer_senders };
        let idx = (connection_id as usize) % senders.len();
        senders[idx].send(task).await.map_err(|_| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "disk worker queue closed"))
        })
    }

    pub fn counters(&self) -> &DiskCounters {
        &self.counters
    }
}

fn is_read(kind: &TaskKind) -> bool {
    matches!(kind, TaskKind::ReadAll(_) | TaskKind::ReadRange(_))
}

fn spawn_workers(
    index: u8,
    label: &str,
    count: usize,
    root: &PathBuf,
    counters: &Arc<DiskCounters>,
) -> Vec<async_channel::Sender<DiskTask>> {
    let mut senders = Vec::with_capacity(count);
    for worker_id in 0..count {
        let (tx, rx) = async_channel::bounded::<DiskTask>(1024);
        let root = root.clone();
        let counters = counters.clone();
        std::thread::Builder::new()
            .name(format!("disk-{label}-{index}-{worker_id}"))
            .spawn(move || worker::run(rx, root, counters))
            .expect("failed to spawn disk worker thread");
        senders.push(tx);
    }
    senders
}
