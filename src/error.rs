//! Crate-wide error taxonomy.
//!
//! Each subsystem defines its own leaf error enum (see `codec::FrameError`,
//! `disk::Error`, `trunk::Error`, `storage::Error`, `client::Error`); this
//! module composes them into a single type for call sites that need one
//! return type, and maps every variant onto the wire status byte a handler
//! sends back to the client.

use thiserror::Error;

use crate::client;
use crate::codec::FrameError;
use crate::disk;
use crate::storage;
use crate::trunk;

/// Top-level error type returned by storage-service entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("disk engine error: {0}")]
    Disk(#[from] disk::Error),
    #[error("trunk allocator error: {0}")]
    Trunk(#[from] trunk::Error),
    #[error("storage error: {0}")]
    Storage(#[from] storage::Error),
    #[error("client error: {0}")]
    Client(#[from] client::Error),
}

/// Non-zero status byte carried in a response header on failure.
///
/// `0` is reserved for success and is never returned here.
pub type StatusCode = u8;

/// Maps an [`Error`] onto the wire status byte used in the 10-byte response
/// header. The mapping favors the closest POSIX errno FastDFS itself would
/// have used; exact numeric stability across server versions is not a
/// requirement of this crate (clients only need `status != 0` plus the
/// [`ErrorKind`] classification for retry decisions).
pub fn status_code(err: &Error) -> StatusCode {
    match kind(err) {
        ErrorKind::FrameError => 22,       // EINVAL
        ErrorKind::NotFound => 2,          // ENOENT
        ErrorKind::AlreadyExists => 17,    // EEXIST
        ErrorKind::QuotaOrNoSpace => 28,   // ENOSPC
        ErrorKind::IOError => 5,           // EIO
        ErrorKind::ConnectionFailed => 111, // ECONNREFUSED
        ErrorKind::ConnectTimeout => 110,  // ETIMEDOUT
        ErrorKind::NetworkTimeout => 110,  // ETIMEDOUT
        ErrorKind::ProtocolMismatch => 71, // EPROTO
        ErrorKind::Cancelled => 125,       // ECANCELED
    }
}

/// Error classification used by the client runtime to decide whether an
/// operation is retryable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    FrameError,
    NotFound,
    AlreadyExists,
    QuotaOrNoSpace,
    IOError,
    ConnectionFailed,
    ConnectTimeout,
    NetworkTimeout,
    ProtocolMismatch,
    Cancelled,
}

impl ErrorKind {
    /// Whether the client runtime should retry an operation that failed
    /// with this error kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionFailed | ErrorKind::ConnectTimeout | ErrorKind::NetworkTimeout
        )
    }
}

/// Classifies an [`Error`] into its [`ErrorKind`].
pub fn kind(err: &Error) -> ErrorKind {
    match err {
        Error::Frame(_) => ErrorKind::FrameError,
        Error::Disk(e) => disk_error_kind(e),
        Error::Trunk(_) => ErrorKind::QuotaOrNoSpace,
        Error::Storage(e) => storage_error_kind(e),
        Error::Client(e) => client_error_kind(e),
    }
}

fn disk_error_kind(err: &disk::Error) -> ErrorKind {
    match err {
        disk::Error::NotFound => ErrorKind::NotFound,
        disk::Error::NoSpace => ErrorKind::QuotaOrNoSpace,
        disk::Error::Io(_) => ErrorKind::IOError,
        disk::Error::Conflict => ErrorKind::IOError,
    }
}

fn storage_error_kind(err: &storage::Error) -> ErrorKind {
    match err {
        storage::Error::NotFound => ErrorKind::NotFound,
        storage::Error::AlreadyExists => ErrorKind::AlreadyExists,
        storage::Error::InvalidRequest(_) => ErrorKind::FrameError,
        storage::Error::QuotaExceeded => ErrorKind::QuotaOrNoSpace,
        storage::Error::Disk(e) => disk_error_kind(e),
        storage::Error::Trunk(_) => ErrorKind::QuotaOrNoSpace,
    }
}

fn client_error_kind(err: &client::Error) -> ErrorKind {
    match err {
        client::Error::ConnectionFailed => ErrorKind::ConnectionFailed,
        client::Error::ConnectTimeout => ErrorKind::ConnectTimeout,
        client::Error::NetworkTimeout => ErrorKind::NetworkTimeout,
        client::Error::ProtocolMismatch(_) => ErrorKind::ProtocolMismatch,
        client::Error::Cancelled => ErrorKind::Cancelled,
        client::Error::Server(status) => status_kind(*status),
    }
}

fn status_kind(status: StatusCode) -> ErrorKind {
    match status {
        2 => ErrorKind::NotFound,
        17 => ErrorKind::AlreadyExists,
        28 => ErrorKind::QuotaOrNoSpace,
        22 => ErrorKind::FrameError,
        _ => ErrorKind::IOError,
    }
}
