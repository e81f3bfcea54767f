//! `UPLOAD_APPENDER`. Appender files never live inside a trunk, so this
//! simply calls the shared upload path with the appender kind forced.

use crate::storage::{Error, Service};
use crate::trunk::SlotFileType;

pub async fn handle(service: &Service, connection_id: u64, body: &[u8]) -> Result<Vec<u8>, Error> {
    super::upload::handle(service, connection_id, body, SlotFileType::Appender).await
}
