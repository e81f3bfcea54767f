//! `QUERY_FILE_INFO`: the target must exist; returns its size,
//! create-time, CRC32, source-IP, and file kind. Body:
//! `[file_id_len:8][file_id]`. Response:
//! `[file_size:8][create_time:8][crc32:4][source_ip:4][kind:1]`.

use crate::codec::primitive::write_u64;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};
use crate::trunk::SlotFileType;

pub async fn handle(service: &Service, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, _) = read_file_id(body)?;
    let record = service.registry.get(&file_id.render()).ok_or(Error::NotFound)?;
    let fields = file_id.fields().map_err(|e| Error::InvalidRequest(e.to_string()))?;

    let mut response = Vec::with_capacity(8 + 8 + 4 + 4 + 1);
    write_u64(&mut response, record.file_size);
    write_u64(&mut response, record.create_unix_time);
    response.extend_from_slice(&record.crc32.to_be_bytes());
    response.extend_from_slice(&fields.source_ip.to_be_bytes());
    response.push(kind_byte(record.kind));
    Ok(response)
}

fn kind_byte(kind: SlotFileType) -> u8 {
    match kind {
        SlotFileType::Normal => 0,
        SlotFileType::Appender => 1,
        SlotFileType::Slave => 2,
        SlotFileType::Link => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitive::{width, write_fixed_str, write_u64};
    use crate::storage::test_support::service;
    use tempfile::TempDir;

    #[tokio::test]
    async fn returns_size_and_crc_for_uploaded_file() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let mut upload = Vec::new();
        write_fixed_str(&mut upload, "txt", width::FORMATTED_EXT).unwrap();
        upload.extend_from_slice(b"hello world");
        let response = super::super::upload::handle(&service, 1, &upload, SlotFileType::Normal).await.unwrap();
        let file_id = String::from_utf8(response).unwrap();

        let mut body = Vec::new();
        write_u64(&mut body, file_id.len() as u64);
        body.extend_from_slice(file_id.as_bytes());

        let info = handle(&service, &body).await.unwrap();
        let size = crate::codec::primitive::read_u64(&info[..8]).unwrap();
        assert_eq!(size, "hello world".len() as u64);
        assert_eq!(info[info.len() - 1], 0);
    }
}
