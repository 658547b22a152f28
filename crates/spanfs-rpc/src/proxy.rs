//! RPC proxies: caller-side handles to remote interfaces.
//!
//! A [`Proxy`] carries the interface name and the remote address and
//! nothing else. Each call opens a fresh connection, writes one call
//! frame, reads one reply frame, and closes. Equality, hashing, and the
//! printable form are local operations over the `(interface, address)`
//! pair and never touch the wire.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::error::RpcError;
use crate::frame::{decode, encode, read_message, write_message, CallFrame, RemoteFault, ReplyFrame, Status};

/// Failure modes of one proxied call.
#[derive(Debug)]
pub enum CallError<F> {
    /// The transport failed: connect, I/O, marshalling, or an RPC-layer
    /// fault reported by the servant.
    Remote(RpcError),
    /// The servant raised an application-level error, reconstructed as
    /// the original kind.
    Fault(F),
}

/// A handle to a remote interface at a fixed network address.
#[derive(Clone, Copy, Debug)]
pub struct Proxy {
    interface: &'static str,
    addr: SocketAddr,
}

impl Proxy {
    /// Creates a proxy to `interface` hosted at `addr`.
    pub fn new(interface: &'static str, addr: SocketAddr) -> Self {
        Proxy { interface, addr }
    }

    /// The remote interface name.
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// The remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Invokes one remote method.
    ///
    /// `params` are the parameter type descriptors written into the call
    /// frame; the servant uses them to disambiguate the call shape.
    /// There are no retries and no imposed deadline: the call returns
    /// when the transport completes or fails.
    pub async fn call<A, R, F>(
        &self,
        method: &str,
        params: &[&str],
        args: &A,
    ) -> Result<R, CallError<F>>
    where
        A: Serialize,
        R: DeserializeOwned,
        F: DeserializeOwned,
    {
        let args = encode(args).map_err(CallError::Remote)?;
        let call = CallFrame {
            method: method.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            args,
        };

        let mut stream = TcpStream::connect(self.addr).await.map_err(|e| {
            CallError::Remote(RpcError::Connect {
                addr: self.addr,
                source: e,
            })
        })?;
        write_message(&mut stream, &call)
            .await
            .map_err(CallError::Remote)?;
        let reply: ReplyFrame = read_message(&mut stream).await.map_err(CallError::Remote)?;

        match reply.status {
            Status::Ok => decode(&reply.body).map_err(CallError::Remote),
            Status::Error => {
                let fault: RemoteFault = decode(&reply.body).map_err(CallError::Remote)?;
                match fault {
                    RemoteFault::Application(bytes) => {
                        let fault: F = decode(&bytes).map_err(CallError::Remote)?;
                        Err(CallError::Fault(fault))
                    }
                    RemoteFault::Protocol(message) => {
                        Err(CallError::Remote(RpcError::Protocol(message)))
                    }
                }
            }
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.addr == other.addr
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface.hash(state);
        self.addr.hash(state);
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.interface, self.addr)
    }
}
