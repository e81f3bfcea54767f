//! `LIST_ONE_GROUP`. Body: `[group_len:8][group]`. Response:
//! `[count:8]` followed by `count` repetitions of
//! `[addr_len:8][addr][state:1]` (state `0`=active, `1`=offline).

use crate::codec::primitive::write_u64;
use crate::tracker::wire::{read_string, state_byte, write_string};
use crate::tracker::{Error, Service};

pub fn handle(service: &Service, body: &[u8]) -> Result<Vec<u8>, Error> {
    let (group, _) = read_string(body)?;
    if !service.registry.group_exists(&group) {
        return Err(Error::UnknownGroup);
    }
    let members = service.registry.list_group(&group);

    let mut out = Vec::new();
    write_u64(&mut out, members.len() as u64);
    for (addr, state) in members {
        write_string(&mut out, &addr.to_string());
        out.push(state_byte(state));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitive::read_u64;
    use crate::tracker::test_support::service;
    use std::time::Duration;

    fn group_body(group: &str) -> Vec<u8> {
        let mut body = Vec::new();
        write_string(&mut body, group);
        body
    }

    #[test]
    fn lists_every_member_of_a_known_group() {
        let service = service(Duration::from_secs(60));
        service.registry.register("group1", "127.0.0.1:2000".parse().unwrap());
        service.registry.register("group1", "127.0.0.1:2001".parse().unwrap());
        let resp = handle(&service, &group_body("group1")).unwrap();
        assert_eq!(read_u64(&resp[..8]).unwrap(), 2);
    }

    #[test]
    fn rejects_unknown_group() {
        let service = service(Duration::from_secs(60));
        assert!(matches!(handle(&service, &group_body("ghost")), Err(Error::UnknownGroup)));
    }
}
