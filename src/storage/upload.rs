//! `UPLOAD` / `UPLOAD_APPENDER` body handling.
//!
//! Body: `[ext: 6 bytes, NUL-padded][data: remaining bytes]`. Response
//! body on success is the new file-id's rendered UTF-8 token.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::primitive::{read_fixed_str, width};
use crate::disk::{self, DiskOutcome, DiskTask, ReadRangePayload, TaskKind, WritePayload};
use crate::fileid::{BasenameFields, FileId};
use crate::storage::registry::{FileLocation, FileRecord};
use crate::storage::{Error, Service};
use crate::trunk::{self, SlotFileType, TrunkInfo};

pub async fn handle(
    service: &Service,
    connection_id: u64,
    body: &[u8],
    kind: SlotFileType,
) -> Result<Vec<u8>, Error> {
    if body.len() < width::FORMATTED_EXT {
        return Err(Error::InvalidRequest("upload body shorter than the extension field".into()));
    }
    let ext = read_fixed_str(&body[..width::FORMATTED_EXT], width::FORMATTED_EXT)
        .map_err(|e| Error::InvalidRequest(e.to_string()))?;
    let data = &body[width::FORMATTED_EXT..];

    if data.len() as u64 > service.max_upload_bytes {
        return Err(Error::QuotaExceeded);
    }

    let store = service.pick_store_path();
    let crc = crc32fast::hash(data);
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs();

    let fields = BasenameFields {
        upload_timestamp: now as u32,
        crc32: crc,
        source_ip: BasenameFields::pack_source_ip(service.source_ip),
        random: service.next_random(),
    };
    let file_id = FileId::new(&service.group_name, store.index, fields, &ext);

    let trunked = kind == SlotFileType::Normal && (data.len() as u64) <= service.small_file_threshold;

    let location = if trunked {
        write_trunked(&store, &file_id, data, crc, now, kind).await?
    } else {
        write_standalone(&store, connection_id, &file_id, data).await?
    };

    service.registry.insert(
        file_id.render(),
        FileRecord {
            store_path_index: store.index,
            location,
            kind,
            file_size: data.len() as u64,
            crc32: crc,
            create_unix_time: now,
            metadata: Default::default(),
            master_file_id: None,
        },
    );

    Ok(file_id.render().into_bytes())
}

pub(crate) async fn write_standalone(
    store: &crate::disk::StorePath,
    connection_id: u64,
    file_id: &FileId,
    data: &[u8],
) -> Result<FileLocation, Error> {
    let relative_path = standalone_path(file_id);
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask {
                kind: TaskKind::WriteNew(WritePayload { relative_path: relative_path.clone(), contents: data.to_vec() }),
                reply: reply_tx,
            },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Written)) => Ok(FileLocation::Standalone { relative_path }),
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for write".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

/// Writes `data` into a trunk slot: allocate, write the 24-byte slot
/// header plus payload, and return the slot's [`TrunkInfo`].
pub(crate) async fn write_trunked(
    store: &crate::disk::StorePath,
    file_id: &FileId,
    data: &[u8],
    crc: u32,
    now: u64,
    kind: SlotFileType,
) -> Result<FileLocation, Error> {
    let slot_len = crate::trunk::header::SLOT_HEADER_LEN as u32 + data.len() as u32;
    let info: TrunkInfo = store.trunks.allocate(slot_len)?;
    let relative_path = trunk_file_path(store.index, info.trunk_id);

    if let Err(e) = reject_if_slot_occupied(store, &relative_path, info).await {
        store.trunks.release(info);
        return Err(e);
    }

    let mut ext_bytes = [0u8; 7];
    let ext = file_id.ext.as_bytes();
    let copy_len = ext.len().min(7);
    ext_bytes[..copy_len].copy_from_slice(&ext[..copy_len]);

    let header = crate::trunk::header::SlotHeader {
        alloc_size: info.slot_size,
        file_size: data.len() as u32,
        crc32: crc,
        mtime: now as u32,
        file_type: kind,
        formatted_ext: ext_bytes,
    };

    let mut contents = Vec::with_capacity(crate::trunk::header::SLOT_HEADER_LEN + data.len());
    contents.extend_from_slice(&header.encode());
    contents.extend_from_slice(data);

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            // Trunk files are shared across connections; route by trunk id
            // instead of connection id so writes to one trunk serialize.
            info.trunk_id as u64,
            DiskTask {
                kind: TaskKind::WriteTrunkSlot(crate::disk::WriteTrunkSlotPayload {
                    relative_path,
                    offset: info.offset,
                    contents,
                }),
                reply: reply_tx,
            },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Written)) => Ok(FileLocation::Trunked { info }),
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for trunk write".into())),
        Ok(Err(e)) => {
            store.trunks.release(info);
            Err(Error::Disk(e))
        }
        Err(_) => {
            store.trunks.release(info);
            Err(Error::InvalidRequest("disk worker dropped the reply channel".into()))
        }
    }
}

/// Reads the slot header already on disk at `info`'s offset, if any, and
/// rejects the allocation with [`trunk::Error::Conflict`] when it is still
/// occupied. A fresh trunk file (not yet created) or a slot past the
/// current end of file has no header to conflict with.
async fn reject_if_slot_occupied(
    store: &crate::disk::StorePath,
    relative_path: &std::path::Path,
    info: TrunkInfo,
) -> Result<(), Error> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            info.trunk_id as u64,
            DiskTask {
                kind: TaskKind::ReadRange(ReadRangePayload {
                    relative_path: relative_path.to_path_buf(),
                    offset: info.offset,
                    len: crate::trunk::header::SLOT_HEADER_LEN as u64,
                }),
                reply: reply_tx,
            },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Bytes(bytes))) => {
            if let Ok(buf) = <[u8; crate::trunk::header::SLOT_HEADER_LEN]>::try_from(bytes.as_slice()) {
                if let Some(header) = crate::trunk::header::SlotHeader::decode(&buf) {
                    if header.is_occupied() {
                        return Err(Error::Trunk(trunk::Error::Conflict));
                    }
                }
            }
            Ok(())
        }
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for slot probe".into())),
        Ok(Err(disk::Error::NotFound)) => Ok(()),
        Ok(Err(disk::Error::Io(io_err))) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

/// Sibling metadata-file path for `file_id`: `<root>/data/<LL>/<LL>/<basename>-m`.
/// Independent of whether the content itself is standalone or trunk-packed.
pub fn metadata_path(file_id: &FileId) -> std::path::PathBuf {
    let mut path = std::path::PathBuf::from("data");
    path.push(&file_id.dir1);
    path.push(&file_id.dir2);
    path.push(format!("{}-m", file_id.basename));
    path
}

/// Deterministic on-disk path for a standalone file:
/// `<root>/data/<LL>/<LL>/<basename>.<ext>`.
pub fn standalone_path(file_id: &FileId) -> std::path::PathBuf {
    let mut path = std::path::PathBuf::from("data");
    path.push(&file_id.dir1);
    path.push(&file_id.dir2);
    let filename =
        if file_id.ext.is_empty() { file_id.basename.clone() } else { format!("{}.{}", file_id.basename, file_id.ext) };
    path.push(filename);
    path
}

/// `<root>/data/trunk/<trunk-id>`.
pub fn trunk_file_path(_store_path_index: u8, trunk_id: u32) -> std::path::PathBuf {
    std::path::PathBuf::from("data").join("trunk").join(format!("{trunk_id}"))
}
