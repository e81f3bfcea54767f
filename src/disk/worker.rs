//! The blocking body of one disk worker thread.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::counters::DiskCounters;
use super::task::{DiskOutcome, DiskTask, TaskKind};
use super::Error;

/// Drains `rx` until the channel is closed, running each task to completion
/// before picking up the next — this is what gives tasks from one
/// connection a well-defined order.
pub fn run(rx: async_channel::Receiver<DiskTask>, root: PathBuf, counters: Arc<DiskCounters>) {
    while let Ok(task) = rx.recv_blocking() {
        let outcome = execute(&root, task.kind, &counters);
        let _ = task.reply.send(outcome);
    }
}

fn execute(root: &Path, kind: TaskKind, counters: &DiskCounters) -> Result<DiskOutcome, Error> {
    match kind {
        TaskKind::WriteNew(payload) => {
            let path = root.join(&payload.relative_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &payload.contents)?;
            counters.record_write(payload.contents.len() as u64);
            Ok(DiskOutcome::Written)
        }
        TaskKind::Append(payload) => {
            let path = root.join(&payload.relative_path);
            let mut file = fs::OpenOptions::new().append(true).open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })?;
            file.write_all(&payload.contents)?;
            counters.record_write(payload.contents.len() as u64);
            Ok(DiskOutcome::Appended)
        }
        TaskKind::Truncate(payload) => {
            let path = root.join(&payload.relative_path);
            let file = fs::OpenOptions::new().write(true).open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })?;
            file.set_len(payload.new_len)?;
            Ok(DiskOutcome::Truncated)
        }
        TaskKind::Modify(payload) => {
            let path = root.join(&payload.relative_path);
            let mut file = fs::OpenOptions::new().write(true).open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })?;
            file.seek(SeekFrom::Start(payload.offset))?;
            file.write_all(&payload.contents)?;
            counters.record_write(payload.contents.len() as u64);
            Ok(DiskOutcome::Modified)
        }
        TaskKind::ReadAll(payload) => {
            let path = root.join(&payload.relative_path);
            let bytes = fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })?;
            counters.record_read(bytes.len() as u64);
            Ok(DiskOutcome::Bytes(bytes))
        }
        TaskKind::ReadRange(payload) => {
            let path = root.join(&payload.relative_path);
            let mut file = fs::File::open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound
                } else {
                    Error::Io(e)
                }
            })?;
            file.seek(SeekFrom::Start(payload.offset))?;
            let mut buf = vec![0u8; payload.len as usize];
            file.read_exact(&mut buf)?;
            counters.record_read(buf.len() as u64);
            Ok(DiskOutcome::Bytes(buf))
        }
        TaskKind::WriteTrunkSlot(payload) => {
            let path = root.join(&payload.relative_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::OpenOptions::new().create(true).read(true).write(true).open(&path)?;
            if slot_is_occupied(&mut file, payload.offset)? {
                return Err(Error::Conflict);
            }
            file.seek(SeekFrom::Start(payload.offset))?;
            file.write_all(&payload.contents)?;
            counters.record_write(payload.contents.len() as u64);
            Ok(DiskOutcome::Written)
        }
        TaskKind::Delete(payload) => {
            let path = root.join(&payload.relative_path);
            match fs::remove_file(&path) {
                Ok(()) => Ok(DiskOutcome::Deleted),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
                Err(e) => Err(Error::Io(e)),
            }
        }
    }
}

/// Re-reads the slot header right before a trunk-slot write so two
/// concurrent uploads racing for the same offset (on different workers,
/// past the service-layer probe) don't silently clobber each other.
fn slot_is_occupied(file: &mut fs::File, offset: u64) -> Result<bool, Error> {
    use crate::trunk::header::{SlotHeader, SLOT_HEADER_LEN};

    let len = file.metadata()?.len();
    if len < offset + SLOT_HEADER_LEN as u64 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; SLOT_HEADER_LEN];
    file.read_exact(&mut buf)?;
    Ok(SlotHeader::decode(&buf).is_some_and(|h| h.is_occupied()))
}
