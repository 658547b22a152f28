//! Wire frames for the spanfs RPC protocol.
//!
//! One call per connection. The caller writes a [`CallFrame`] holding
//! the method identifier, parameter type descriptors, and the
//! bincode-encoded argument tuple; the servant answers with a [`ReplyFrame`]
//! carrying a status tag and either the encoded return value or an
//! encoded fault. Both frames travel as u32 big-endian length-prefixed
//! bincode messages, after which the connection is closed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RpcError};

/// Largest frame either side will accept.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// One remote invocation as written by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallFrame {
    /// Method identifier within the remote interface.
    pub method: String,
    /// Parameter type descriptors, used to disambiguate the call shape.
    pub params: Vec<String>,
    /// Bincode-encoded argument tuple.
    pub args: Vec<u8>,
}

/// Reply status tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// The call returned normally; the body is the encoded return value.
    Ok,
    /// The call failed; the body is an encoded [`RemoteFault`].
    Error,
}

/// The servant's answer to a [`CallFrame`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyFrame {
    /// Outcome tag.
    pub status: Status,
    /// Encoded return value or encoded fault, per `status`.
    pub body: Vec<u8>,
}

/// Fault payload carried in an error reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RemoteFault {
    /// An error raised by the servant itself, encoded so the caller can
    /// rethrow it as the original kind.
    Application(Vec<u8>),
    /// A failure inside the RPC layer: unknown method, mismatched
    /// parameter descriptors, undecodable arguments.
    Protocol(String),
}

/// Serializes any serde-compatible value with bincode.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| RpcError::Serialization(e.to_string()))
}

/// Deserializes a bincode-encoded value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| RpcError::Serialization(e.to_string()))
}

/// Writes one length-prefixed message to the stream and flushes.
pub async fn write_message<T, W>(stream: &mut W, message: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let body = encode(message)?;
    let len = body.len() as u32;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one length-prefixed message from the stream.
pub async fn read_message<T, R>(stream: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut body = vec![0u8; len as usize];
    if !body.is_empty() {
        stream.read_exact(&mut body).await?;
    }
    decode(&body)
}
