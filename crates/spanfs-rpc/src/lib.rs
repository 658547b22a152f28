//! spanfs RPC substrate: typed request/response calls over TCP.
//!
//! The generic pieces are the frame codec ([`frame`]), the listener that
//! exposes a [`Dispatch`] implementation on an endpoint ([`listener`]),
//! and the caller-side [`Proxy`] ([`proxy`]). One call travels per
//! connection: method tag, parameter descriptors, and the bincode-encoded
//! argument tuple out; a status tag and either the return value or a
//! fault back.
//!
//! The concrete spanfs interface contracts live in [`api`] and the typed
//! clients built on them in [`client`].

pub mod api;
pub mod client;
pub mod error;
pub mod frame;
pub mod listener;
pub mod proxy;

pub use client::{CommandClient, RegistrationClient, ServiceClient, StorageClient};
pub use error::{Result, RpcError};
pub use frame::{CallFrame, RemoteFault, ReplyFrame, Status, MAX_FRAME_SIZE};
pub use listener::{parse_args, reply, Dispatch, Hooks, Listener, NoHooks, Outcome};
pub use proxy::{CallError, Proxy};
