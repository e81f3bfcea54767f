//! `DOWNLOAD`: the file-id must resolve and the requested range must lie
//! within the file; streams the requested bytes back. `Link` files resolve
//! one hop to their target.
//!
//! Body: `[file_id_len:8][file_id][offset:8][length:8]`; `length == 0`
//! means "to end of file".

use crate::codec::primitive::{read_u64, write_u64};
use crate::disk::{DiskOutcome, DiskTask, ReadPayload, ReadRangePayload, TaskKind};
use crate::storage::registry::FileLocation;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, FileRecord, Service};
use crate::trunk::{header::SLOT_HEADER_LEN, SlotFileType};

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, rest) = read_file_id(body)?;
    if rest.len() < 16 {
        return Err(Error::InvalidRequest("download body missing offset/length fields".into()));
    }
    let offset = read_u64(&rest[..8]).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    let length = read_u64(&rest[8..16]).map_err(|e| Error::InvalidRequest(e.to_string()))?;

    let rendered = file_id.render();
    let record = resolve(service, &rendered, 0)?;

    if offset > record.file_size {
        return Err(Error::InvalidRequest("download offset past end of file".into()));
    }
    let remaining = record.file_size - offset;
    let want = if length == 0 { remaining } else { length.min(remaining) };

    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;
    let bytes = match &record.location {
        FileLocation::Standalone { relative_path } => {
            read_from_store(&store, connection_id, relative_path.clone(), offset, want).await?
        }
        FileLocation::Trunked { info } => {
            let path = super::upload::trunk_file_path(record.store_path_index, info.trunk_id);
            let slot_offset = info.offset + SLOT_HEADER_LEN as u64 + offset;
            read_range_from_store(&store, connection_id, path, slot_offset, want).await?
        }
        FileLocation::Link { .. } => {
            return Err(Error::InvalidRequest("resolved record unexpectedly still a link".into()))
        }
    };

    let mut response = Vec::with_capacity(8 + bytes.len());
    write_u64(&mut response, bytes.len() as u64);
    response.extend_from_slice(&bytes);
    Ok(response)
}

/// Resolves `file_id` in the registry, following one `Link` hop.
/// A link pointing at another link is rejected rather than chased further.
fn resolve(service: &Service, file_id: &str, hops: u8) -> Result<FileRecord, Error> {
    let record = service.registry.get(file_id).ok_or(Error::NotFound)?;
    if record.kind != SlotFileType::Link {
        return Ok(record);
    }
    if hops > 0 {
        return Err(Error::InvalidRequest("link chains are not followed past one hop".into()));
    }
    let target = match &record.location {
        FileLocation::Link { target_file_id } => target_file_id.clone(),
        _ => return Err(Error::InvalidRequest("link record missing a target file-id".into())),
    };
    resolve(service, &target, hops + 1)
}

async fn read_from_store(
    store: &crate::disk::StorePath,
    connection_id: u64,
    relative_path: std::path::PathBuf,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, Error> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    let kind = if offset == 0 {
        TaskKind::ReadAll(ReadPayload { relative_path })
    } else {
        TaskKind::ReadRange(ReadRangePayload { relative_path, offset, len: length })
    };
    store.submit(connection_id, DiskTask { kind, reply: reply_tx }).await.map_err(Error::Disk)?;
    match reply_rx.await {
        Ok(Ok(DiskOutcome::Bytes(mut bytes))) => {
            if offset == 0 {
                bytes.truncate(length as usize);
            }
            Ok(bytes)
        }
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for read".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

async fn read_range_from_store(
    store: &crate::disk::StorePath,
    connection_id: u64,
    relative_path: std::path::PathBuf,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, Error> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask { kind: TaskKind::ReadRange(ReadRangePayload { relative_path, offset, len: length }), reply: reply_tx },
        )
        .await
        .map_err(Error::Disk)?;
    match reply_rx.await {
        Ok(Ok(DiskOutcome::Bytes(bytes))) => Ok(bytes),
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for read".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}
