//! `QUERY_STORAGE_FOR_UPLOAD` / `QUERY_STORAGE_FOR_FETCH`.
//!
//! Upload body: `[group_len:8][group]`; an empty group name means "pick
//! any group with an active storage node". Fetch body:
//! `[file_id_len:8][file_id]`, with the group recovered from the file-id's
//! leading `<group>/` component.

use crate::tracker::wire::{encode_storage_answer, read_string};
use crate::tracker::{Error, Service};

pub fn handle_for_upload(service: &Service, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (group, _) = read_string(body)?;
    if group.is_empty() {
        let (group, addr) = service.registry.pick_any_active().ok_or(Error::NoActiveStorage)?;
        return Ok(encode_storage_answer(&group, addr));
    }
    if !service.registry.group_exists(&group) {
        return Err(Error::UnknownGroup);
    }
    let addr = service.registry.pick_active(&group).ok_or(Error::NoActiveStorage)?;
    Ok(encode_storage_answer(&group, addr))
}

pub fn handle_for_fetch(service: &Service, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (file_id, _) = read_string(body)?;
    let group = file_id
        .split_once('/')
        .map(|(group, _)| group.to_owned())
        .ok_or_else(|| Error::InvalidRequest("file-id is missing its group prefix".into()))?;
    if !service.registry.group_exists(&group) {
        return Err(Error::UnknownGroup);
    }
    let addr = service.registry.pick_active(&group).ok_or(Error::NoActiveStorage)?;
    Ok(encode_storage_answer(&group, addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::test_support::service;
    use std::time::Duration;

    fn upload_body(group: &str) -> Vec<u8> {
        let mut body = Vec::new();
        crate::tracker::wire::write_string(&mut body, group);
        body
    }

    #[test]
    fn upload_picks_the_named_group() {
        let service = service(Duration::from_secs(60));
        service.registry.register("group1", "127.0.0.1:2000".parse().unwrap());
        let resp = handle_for_upload(&service, &upload_body("group1")).unwrap();
        assert!(resp.len() > 8);
    }

    #[test]
    fn upload_rejects_unknown_group() {
        let service = service(Duration::from_secs(60));
        assert!(matches!(handle_for_upload(&service, &upload_body("ghost")), Err(Error::UnknownGroup)));
    }

    #[test]
    fn fetch_recovers_group_from_file_id() {
        let service = service(Duration::from_secs(60));
        service.registry.register("group1", "127.0.0.1:2000".parse().unwrap());
        let mut body = Vec::new();
        crate::tracker::wire::write_string(&mut body, "group1/00aabb/file.txt");
        assert!(handle_for_fetch(&service, &body).is_ok());
    }
}
