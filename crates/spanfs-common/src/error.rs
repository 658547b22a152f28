//! Error taxonomy shared by every spanfs component.
//!
//! `FsError` is serializable so that a servant-raised error crosses the
//! RPC boundary and is rethrown at the caller as the original kind. The
//! `Remote` kind is produced only on the caller's side of the wire, when
//! the transport itself fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by spanfs filesystem operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FsError {
    /// A remote call failed at the transport level: connect, I/O,
    /// marshalling, or an unknown method. Never retried automatically.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// A path does not exist, or no storage servers are registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed path, out-of-range offset, or an operation aimed at the
    /// root where the root is disallowed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A storage server attempted to register endpoints that are already
    /// in the registry.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// `start` or `stop` called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Local file I/O failed on a storage server.
    #[error("i/o failure: {0}")]
    Io(String),
}

impl FsError {
    /// Shorthand for a `NotFound` about a path.
    pub fn not_found(detail: impl Into<String>) -> Self {
        FsError::NotFound(detail.into())
    }

    /// Shorthand for an `InvalidArgument`.
    pub fn invalid(detail: impl Into<String>) -> Self {
        FsError::InvalidArgument(detail.into())
    }
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound(e.to_string())
        } else {
            FsError::Io(e.to_string())
        }
    }
}

/// Result alias used across spanfs crates.
pub type Result<T> = std::result::Result<T, FsError>;
