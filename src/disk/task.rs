//! Work items submitted to a disk worker thread.

use std::path::PathBuf;
use tokio::sync::oneshot;

use super::Error;

#[derive(Debug)]
pub struct WritePayload {
    /// Path relative to the owning store path's root.
    pub relative_path: PathBuf,
    pub contents: Vec<u8>,
}

/// Writes `contents` (header + payload) at a fixed offset inside a shared
/// trunk file, creating the trunk file first if this is its first slot
///.
#[derive(Debug)]
pub struct WriteTrunkSlotPayload {
    pub relative_path: PathBuf,
    pub offset: u64,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct AppendPayload {
    pub relative_path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct TruncatePayload {
    pub relative_path: PathBuf,
    pub new_len: u64,
}

/// Overwrites `[offset, offset + contents.len())` in place.
#[derive(Debug)]
pub struct ModifyPayload {
    pub relative_path: PathBuf,
    pub offset: u64,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct ReadPayload {
    pub relative_path: PathBuf,
}

#[derive(Debug)]
pub struct ReadRangePayload {
    pub relative_path: PathBuf,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug)]
pub struct DeletePayload {
    pub relative_path: PathBuf,
}

/// Discriminates the blocking filesystem operation a [`DiskTask`] performs.
#[derive(Debug)]
pub enum TaskKind {
    WriteNew(WritePayload),
    Append(AppendPayload),
    Truncate(TruncatePayload),
    Modify(ModifyPayload),
    ReadAll(ReadPayload),
    ReadRange(ReadRangePayload),
    Delete(DeletePayload),
    WriteTrunkSlot(WriteTrunkSlotPayload),
}

/// What a completed [`DiskTask`] hands back on its reply channel.
#[derive(Debug, PartialEq, Eq)]
pub enum DiskOutcome {
    Written,
    Appended,
    Truncated,
    Modified,
    Bytes(Vec<u8>),
    Deleted,
}

/// A unit of work queued to a disk worker thread, with a one-shot channel
/// for the caller to await the result.
pub struct DiskTask {
    pub kind: TaskKind,
    pub reply: oneshot::Sender<Result<DiskOutcome, Error>>,
}
