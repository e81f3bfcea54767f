//! `APPEND`: the target must be an appender file; extends it by the
//! request's data. On a mid-append failure the file is truncated back to
//! its pre-append length.
//!
//! Body: `[file_id_len:8][file_id][data...]`.

use crate::disk::{AppendPayload, DiskOutcome, DiskTask, TaskKind, TruncatePayload};
use crate::storage::registry::FileLocation;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};
use crate::trunk::SlotFileType;

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, data) = read_file_id(body)?;
    if data.is_empty() {
        return Err(Error::InvalidRequest("append body carries no data".into()));
    }

    let rendered = file_id.render();
    let record = service.registry.get(&rendered).ok_or(Error::NotFound)?;
    if record.kind != SlotFileType::Appender {
        return Err(Error::InvalidRequest("append target is not an appender file".into()));
    }
    let relative_path = match &record.location {
        FileLocation::Standalone { relative_path } => relative_path.clone(),
        _ => return Err(Error::InvalidRequest("appender file unexpectedly not standalone".into())),
    };
    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask {
                kind: TaskKind::Append(AppendPayload { relative_path: relative_path.clone(), contents: data.to_vec() }),
                reply: reply_tx,
            },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Appended)) => {
            service.registry.update_size(&rendered, record.file_size + data.len() as u64);
            Ok(Vec::new())
        }
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for append".into())),
        Ok(Err(e)) => {
            let (rollback_tx, _rollback_rx) = tokio::sync::oneshot::channel();
            let _ = store
                .submit(
                    connection_id,
                    DiskTask {
                        kind: TaskKind::Truncate(TruncatePayload { relative_path, new_len: record.file_size }),
                        reply: rollback_tx,
                    },
                )
                .await;
            Err(Error::Disk(e))
        }
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitive::{width, write_fixed_str, write_u64};
    use crate::storage::test_support::service;
    use tempfile::TempDir;

    fn upload_appender_body(ext: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        write_fixed_str(&mut body, ext, width::FORMATTED_EXT).unwrap();
        body.extend_from_slice(data);
        body
    }

    fn append_body(file_id: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        write_u64(&mut body, file_id.len() as u64);
        body.extend_from_slice(file_id.as_bytes());
        body.extend_from_slice(data);
        body
    }

    #[tokio::test]
    async fn append_extends_file_size() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let response = super::super::upload_appender::handle(&service, 1, &upload_appender_body("log", b"first")).await.unwrap();
        let file_id = String::from_utf8(response).unwrap();

        handle(&service, 1, &append_body(&file_id, b"-second")).await.unwrap();
        assert_eq!(service.registry.get(&file_id).unwrap().file_size, "first".len() as u64 + "-second".len() as u64);
    }

    #[tokio::test]
    async fn append_rejects_non_appender_target() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let response =
            super::super::upload::handle(&service, 1, &upload_appender_body("txt", b"normal"), crate::trunk::SlotFileType::Normal)
                .await
                .unwrap();
        let file_id = String::from_utf8(response).unwrap();
        assert!(matches!(handle(&service, 1, &append_body(&file_id, b"more")).await, Err(Error::InvalidRequest(_))));
    }
}
