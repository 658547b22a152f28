//! spanfs naming server.
//!
//! The naming server owns the logical directory tree of a spanfs
//! deployment. It stores no file data; it maps each path to the storage
//! servers hosting the file's bytes, coordinates access through per-node
//! path locks, and orchestrates replication and invalidation across
//! storage servers.
//!
//! Clients reach it through the `Service` interface, storage servers
//! through `Registration`; both are served by the RPC substrate in
//! `spanfs-rpc`.

pub mod dispatch;
pub mod fanout;
pub mod lock;
pub mod registry;
pub mod server;
pub mod tree;

pub use fanout::{CommandFanout, RpcCommandFanout};
pub use registry::Registry;
pub use server::{
    NamingConfig, NamingServer, ServerHooks, REGISTRATION_PORT, SERVICE_PORT,
};
pub use tree::{HashTree, DEFAULT_REPLICATE_AFTER};
