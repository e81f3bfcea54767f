//! `GET_METADATA`: the target must exist; returns its metadata key/value
//! set. Body: `[file_id_len:8][file_id]`; response is the serialized
//! `-m` sibling-file format, read back from disk.

use crate::disk::{self, DiskOutcome, DiskTask, ReadPayload, TaskKind};
use crate::metadata;
use crate::storage::upload::metadata_path;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, _) = read_file_id(body)?;
    let rendered = file_id.render();
    let record = service.registry.get(&rendered).ok_or(Error::NotFound)?;
    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask { kind: TaskKind::ReadAll(ReadPayload { relative_path: metadata_path(&file_id) }), reply: reply_tx },
        )
        .await
        .map_err(Error::Disk)?;

    match reply_rx.await {
        Ok(Ok(DiskOutcome::Bytes(bytes))) => Ok(bytes),
        // No `-m` file has ever been written for this file: fall back to the
        // registry, which still holds whatever SET_METADATA applied in memory.
        Ok(Err(disk::Error::NotFound)) => Ok(metadata::serialize(&record.metadata)),
        Ok(Ok(_)) => Err(Error::InvalidRequest("unexpected disk outcome for metadata read".into())),
        Ok(Err(e)) => Err(Error::Disk(e)),
        Err(_) => Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitive::{width, write_fixed_str, write_u64};
    use crate::storage::test_support::service;
    use crate::trunk::SlotFileType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn fresh_upload_has_empty_metadata() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let mut upload = Vec::new();
        write_fixed_str(&mut upload, "txt", width::FORMATTED_EXT).unwrap();
        upload.extend_from_slice(b"hello");
        let response = super::super::upload::handle(&service, 1, &upload, SlotFileType::Normal).await.unwrap();
        let file_id = String::from_utf8(response).unwrap();

        let mut body = Vec::new();
        write_u64(&mut body, file_id.len() as u64);
        body.extend_from_slice(file_id.as_bytes());
        assert!(handle(&service, 1, &body).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_metadata_written_by_set_metadata_from_disk() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let mut upload = Vec::new();
        write_fixed_str(&mut upload, "txt", width::FORMATTED_EXT).unwrap();
        upload.extend_from_slice(b"hello");
        let response = super::super::upload::handle(&service, 1, &upload, SlotFileType::Normal).await.unwrap();
        let file_id = String::from_utf8(response).unwrap();

        let map: metadata::Metadata = [("a".to_owned(), "1".to_owned())].into_iter().collect();
        let mut set_body = Vec::new();
        write_u64(&mut set_body, file_id.len() as u64);
        set_body.extend_from_slice(file_id.as_bytes());
        set_body.push(b'O');
        set_body.extend_from_slice(&metadata::serialize(&map));
        super::super::set_metadata::handle(&service, 1, &set_body).await.unwrap();

        // Drop the registry's copy to prove the response came from the on-disk
        // sibling file rather than the in-memory metadata.
        service.registry.update_metadata(&file_id, metadata::Metadata::new());

        let mut get_body = Vec::new();
        write_u64(&mut get_body, file_id.len() as u64);
        get_body.extend_from_slice(file_id.as_bytes());
        let bytes = handle(&service, 1, &get_body).await.unwrap();
        assert_eq!(metadata::parse(&bytes).unwrap(), map);
    }
}
