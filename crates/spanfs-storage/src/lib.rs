//! spanfs storage server.
//!
//! Storage servers hold the file bytes of a spanfs deployment. Each one
//! serves a directory of its local filesystem through two remote
//! interfaces: `Storage` for client reads and writes, and `Command` for
//! naming-server administration (create, delete, copy). On startup a
//! storage server registers everything it holds with the naming server
//! and deletes whatever the naming server rejects as duplicate.

pub mod dispatch;
pub mod server;

pub use server::{ServerHooks, StorageConfig, StorageServer};
