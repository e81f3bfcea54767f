//! `TRUNCATE` and `MODIFY`: both require an Appender
//! target. Truncate resizes the file; modify overwrites a byte range in
//! place and is not rolled back on failure — a failed modify is logged but
//! left as-is.
//!
//! `TRUNCATE` body: `[file_id_len:8][file_id][new_size:8]`.
//! `MODIFY` body: `[file_id_len:8][file_id][offset:8][data...]`.

use crate::codec::primitive::read_u64;
use crate::disk::{DiskOutcome, DiskTask, ModifyPayload, TaskKind, TruncatePayload};
use crate::storage::registry::FileLocation;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};
use crate::trunk::SlotFileType;

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, rest) = read_file_id(body)?;
    if rest.len() < 8 {
        return Err(Error::InvalidRequest("truncate body missing new-size field".into()));
    }
    let new_len = read_u64(&rest[..8]).map_err(|e| Error::InvalidRequest(e.to_string()))?;

    let rendered = file_id.render();
    let (record, relative_path) = appender_location(service, &rendered)?;
    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(connection_id, DiskTask { kind: TaskKind::Truncate(TruncatePayload { relative_path, new_len }), reply: reply_tx })
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Truncated)) => {
            service.registry.update_size(&rendered, new_len);
            Ok(Vec::new())
        }
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for truncate".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

pub async fn handle_modify(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, rest) = read_file_id(body)?;
    if rest.len() < 8 {
        return Err(Error::InvalidRequest("modify body missing offset field".into()));
    }
    let offset = read_u64(&rest[..8]).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    let data = &rest[8..];
    if data.is_empty() {
        return Err(Error::InvalidRequest("modify body carries no data".into()));
    }

    let rendered = file_id.render();
    let (record, relative_path) = appender_location(service, &rendered)?;
    if offset + data.len() as u64 > record.file_size {
        return Err(Error::InvalidRequest("modify range extends past end of file".into()));
    }
    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask { kind: TaskKind::Modify(ModifyPayload { relative_path, offset, contents: data.to_vec() }), reply: reply_tx },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Modified)) => Ok(Vec::new()),
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for modify".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

fn appender_location(
    service: &Service,
    file_id: &str,
) -> Result<(crate::storage::FileRecord, std::path::PathBuf), Error> {
    let record = service.registry.get(file_id).ok_or(Error::NotFound)?;
    if record.kind != SlotFileType::Appender {
        return Err(Error::InvalidRequest("target is not an appender file".into()));
    }
    match record.location.clone() {
        FileLocation::Standalone { relative_path } => Ok((record, relative_path)),
        _ => Err(Error::InvalidRequest("appender file unexpectedly not standalone".into())),
    }
}
