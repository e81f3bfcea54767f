//! `SET_METADATA`: the target must exist; overwrites or merges its
//! metadata depending on the flag. Body:
//! `[file_id_len:8][file_id][flag:1]['O'|'M'][metadata bytes...]`;
//! keys/values are validated against the 64/256-byte maximums here,
//! failing with `FrameError` on violation.

use crate::codec::FrameError;
use crate::disk::{DiskOutcome, DiskTask, TaskKind, WritePayload};
use crate::metadata::{self, SetMode};
use crate::storage::upload::metadata_path;
use crate::storage::wire::read_file_id;
use crate::storage::{Error, Service};

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, rest) = read_file_id(body)?;
    if rest.is_empty() {
        return Err(Error::InvalidRequest(FrameError::MissingField("metadata mode flag").to_string()));
    }
    let mode = SetMode::from_flag(rest[0]).ok_or_else(|| Error::InvalidRequest("unknown metadata mode flag".into()))?;
    let incoming = metadata::parse(&rest[1..]).map_err(|e| Error::InvalidRequest(e.to_string()))?;
    metadata::validate(&incoming).map_err(|e| Error::InvalidRequest(e.to_string()))?;

    let rendered = file_id.render();
    let record = service.registry.get(&rendered).ok_or(Error::NotFound)?;
    let store = service.store_path(record.store_path_index).ok_or(Error::NotFound)?;
    let merged = metadata::apply(record.metadata, incoming, mode);

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    store
        .submit(
            connection_id,
            DiskTask {
                kind: TaskKind::WriteNew(WritePayload {
                    relative_path: metadata_path(&file_id),
                    contents: metadata::serialize(&merged),
                }),
                reply: reply_tx,
            },
        )
        .await
        .map_err(Error::Disk)?;
    match reply_rx.await {
        Ok(Ok(DiskOutcome::Written)) => {}
        Ok(Ok(_)) => return Err(Error::InvalidRequest("unexpected disk outcome for metadata write".into())),
        Ok(Err(e)) => return Err(Error::Disk(e)),
        Err(_) => return Err(Error::InvalidRequest("disk worker dropped the reply channel".into())),
    }

    service.registry.update_metadata(&rendered, merged);
    Ok(Vec::new())
}
