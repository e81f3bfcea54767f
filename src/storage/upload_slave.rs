//! `UPLOAD_SLAVE`: the master must exist, the prefix must
//! be non-empty and begin with `_` or `-`; the slave shares the master's
//! group and store path.
//!
//! Body: `[master_file_id_len:8][master_file_id][prefix:16][ext:6][data...]`.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::primitive::{read_fixed_str, width};
use crate::fileid::FileId;
use crate::storage::registry::FileRecord;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};
use crate::trunk::SlotFileType;

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (master_id, rest) = read_file_id(body)?;
    let master_rendered = master_id.render();
    let master = service.registry.get(&master_rendered).ok_or(Error::NotFound)?;

    if rest.len() < width::FILENAME_PREFIX + width::FORMATTED_EXT {
        return Err(Error::InvalidRequest("upload_slave body missing prefix/extension fields".into()));
    }
    let prefix = read_fixed_str(&rest[..width::FILENAME_PREFIX], width::FILENAME_PREFIX)
        .map_err(|e| Error::InvalidRequest(e.to_string()))?;
    if !(prefix.starts_with('_') || prefix.starts_with('-')) {
        return Err(Error::InvalidRequest("slave prefix must start with '_' or '-'".into()));
    }

    let ext_offset = width::FILENAME_PREFIX;
    let ext = read_fixed_str(&rest[ext_offset..ext_offset + width::FORMATTED_EXT], width::FORMATTED_EXT)
        .map_err(|e| Error::InvalidRequest(e.to_string()))?;
    let data = &rest[ext_offset + width::FORMATTED_EXT..];
    if data.is_empty() {
        return Err(Error::InvalidRequest("upload_slave body carries no data".into()));
    }
    if data.len() as u64 > service.max_upload_bytes {
        return Err(Error::QuotaExceeded);
    }

    let store = service
        .store_path(master.store_path_index)
        .ok_or(Error::InvalidRequest("master's store path is no longer configured".into()))?;

    let slave_basename = master_id.slave_basename(&prefix);
    let slave_id = FileId {
        group: master_id.group.clone(),
        store_path_index: master_id.store_path_index,
        dir1: master_id.dir1.clone(),
        dir2: master_id.dir2.clone(),
        basename: slave_basename,
        ext,
    };

    if service.registry.contains(&slave_id.render()) {
        return Err(Error::AlreadyExists);
    }

    let crc = crc32fast::hash(data);
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs();

    let location = if (data.len() as u64) <= service.small_file_threshold {
        super::upload::write_trunked(&store, &slave_id, data, crc, now, SlotFileType::Slave).await?
    } else {
        super::upload::write_standalone(&store, connection_id, &slave_id, data).await?
    };

    service.registry.insert(
        slave_id.render(),
        FileRecord {
            store_path_index: store.index,
            location,
            kind: SlotFileType::Slave,
            file_size: data.len() as u64,
            crc32: crc,
            create_unix_time: now,
            metadata: Default::default(),
            master_file_id: Some(master_rendered),
        },
    );

    Ok(slave_id.render().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::service;
    use tempfile::TempDir;

    async fn upload_master(service: &Service, data: &[u8]) -> String {
        let mut body = Vec::new();
        crate::codec::primitive::write_fixed_str(&mut body, "jpg", width::FORMATTED_EXT).unwrap();
        body.extend_from_slice(data);
        let response = super::super::upload::handle(service, 1, &body, SlotFileType::Normal).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    fn slave_body(master_id: &str, prefix: &str, ext: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        crate::codec::primitive::write_u64(&mut body, master_id.len() as u64);
        body.extend_from_slice(master_id.as_bytes());
        crate::codec::primitive::write_fixed_str(&mut body, prefix, width::FILENAME_PREFIX).unwrap();
        crate::codec::primitive::write_fixed_str(&mut body, ext, width::FORMATTED_EXT).unwrap();
        body.extend_from_slice(data);
        body
    }

    #[tokio::test]
    async fn slave_upload_succeeds_against_existing_master() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let master_id = upload_master(&service, b"master bytes").await;

        let body = slave_body(&master_id, "_thumb", "jpg", b"thumbnail bytes");
        let response = handle(&service, 1, &body).await.unwrap();
        let slave_id = String::from_utf8(response).unwrap();
        let record = service.registry.get(&slave_id).unwrap();
        assert_eq!(record.master_file_id.as_deref(), Some(master_id.as_str()));
    }

    #[tokio::test]
    async fn slave_upload_rejects_missing_master() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let body = slave_body("group1/00aabb/doesnotexist.jpg", "_thumb", "jpg", b"data");
        assert!(matches!(handle(&service, 1, &body).await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn slave_upload_rejects_bad_prefix() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let master_id = upload_master(&service, b"master bytes").await;
        let body = slave_body(&master_id, "thumb", "jpg", b"data");
        assert!(matches!(handle(&service, 1, &body).await, Err(Error::InvalidRequest(_))));
    }
}
