use std::net::SocketAddr;

use thiserror::Error;

/// Transport-level failures in the RPC substrate.
///
/// These never carry application semantics; a servant-raised error
/// travels inside the reply frame instead and is rethrown at the caller
/// as its original kind.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("rpc protocol fault: {0}")]
    Protocol(String),

    #[error("listener already started")]
    AlreadyStarted,

    #[error("listener not started")]
    NotStarted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
