//! `DELETE`: the file-id must resolve and not be referenced as a link
//! target; unlinks it or releases its trunk slot. Slave deletion does not
//! cascade to its master.
//!
//! Body: `[file_id_len:8][file_id]`.

use crate::disk::{DeletePayload, DiskOutcome, DiskTask, TaskKind};
use crate::storage::registry::FileLocation;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, _) = read_file_id(body)?;
    let rendered = file_id.render();
    let record = service.registry.get(&rendered).ok_or(Error::NotFound)?;

    if service.registry.is_link_target(&rendered) {
        return Err(Error::InvalidRequest("file is referenced by a link and cannot be deleted".into()));
    }

    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;

    match &record.location {
        FileLocation::Standalone { relative_path } => {
            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            store
                .submit(
                    connection_id,
                    DiskTask { kind: TaskKind::Delete(DeletePayload { relative_path: relative_path.clone() }), reply: reply_tx },
                )
                .await
                .map_err(Error::Disk)?;
            match reply_rx.await {
                Ok(Ok(DiskOutcome::Deleted)) => {}
                Ok(Ok(_)) => return Err(Error::InvalidRequest("unexpected disk outcome for delete".into())),
                Ok(Err(e)) => return Err(Error::Disk(e)),
                Err(_) => return Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
            }
        }
        FileLocation::Trunked { info } => {
            store.trunks.release(*info);
        }
        FileLocation::Link { .. } => {}
    }

    service.registry.remove(&rendered);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitive::{width, write_fixed_str};
    use crate::codec::primitive::write_u64;
    use crate::storage::test_support::service;
    use crate::trunk::SlotFileType;
    use tempfile::TempDir;

    fn upload_body(ext: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        write_fixed_str(&mut body, ext, width::FORMATTED_EXT).unwrap();
        body.extend_from_slice(data);
        body
    }

    fn delete_body(file_id: &str) -> Vec<u8> {
        let mut body = Vec::new();
        write_u64(&mut body, file_id.len() as u64);
        body.extend_from_slice(file_id.as_bytes());
        body
    }

    #[tokio::test]
    async fn delete_removes_file_from_registry_and_disk() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let response =
            super::super::upload::handle(&service, 1, &upload_body("bin", &vec![1u8; 100_000]), SlotFileType::Normal)
                .await
                .unwrap();
        let file_id = String::from_utf8(response).unwrap();

        handle(&service, 1, &delete_body(&file_id)).await.unwrap();
        assert!(!service.registry.contains(&file_id));
    }

    #[tokio::test]
    async fn delete_releases_trunk_slot() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let response =
            super::super::upload::handle(&service, 1, &upload_body("txt", b"small"), SlotFileType::Normal).await.unwrap();
        let file_id = String::from_utf8(response).unwrap();

        handle(&service, 1, &delete_body(&file_id)).await.unwrap();
        assert!(!service.registry.contains(&file_id));
    }

    #[tokio::test]
    async fn delete_is_not_idempotent_on_unknown_file() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(matches!(handle(&service, 1, &delete_body("group1/00aabb/ghost.txt")).await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn delete_rejects_a_file_referenced_by_a_link() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let response =
            super::super::upload::handle(&service, 1, &upload_body("txt", b"target"), SlotFileType::Normal).await.unwrap();
        let target_file_id = String::from_utf8(response).unwrap();

        service.registry.insert(
            "group1/00aabb/link.txt".into(),
            crate::storage::registry::FileRecord {
                store_path_index: 0,
                location: FileLocation::Link { target_file_id: target_file_id.clone() },
                kind: SlotFileType::Link,
                file_size: 0,
                crc32: 0,
                create_unix_time: crate::storage::registry::FileRecord::now(),
                metadata: crate::metadata::Metadata::new(),
                master_file_id: None,
            },
        );

        let result = handle(&service, 1, &delete_body(&target_file_id)).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert!(service.registry.contains(&target_file_id));
    }
}
