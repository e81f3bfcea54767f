//! Storage-node I/O engine and client/storage wire protocol for a
//! FastDFS-style distributed file store.

pub mod client;
pub mod codec;
pub mod config;
pub mod disk;
pub mod error;
pub mod fileid;
pub mod metadata;
pub mod net;
pub mod storage;
pub mod tracker;
pub mod trunk;

pub use error::Error;
