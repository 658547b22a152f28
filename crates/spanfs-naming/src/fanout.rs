//! Outbound command-interface traffic from the naming server.
//!
//! The directory tree and the service operations call storage servers
//! while maintaining replicas: invalidating stale copies under an
//! exclusive lock, minting new copies of hot files, creating files on
//! the chosen server, and fanning out deletes. Routing those calls
//! through a trait keeps the tree testable without sockets.

use async_trait::async_trait;
use spanfs_common::{FsError, Path, StorageRef};
use spanfs_rpc::CommandClient;

/// Command-interface calls made on behalf of the naming server.
#[async_trait]
pub trait CommandFanout: Send + Sync + 'static {
    /// Creates an empty file on `target`.
    async fn create(&self, target: &StorageRef, path: &Path) -> Result<bool, FsError>;

    /// Deletes a file or directory tree on `target`.
    async fn delete(&self, target: &StorageRef, path: &Path) -> Result<bool, FsError>;

    /// Copies `path` onto `target` from `source`'s storage interface.
    async fn copy(&self, target: &StorageRef, path: &Path, source: &StorageRef)
        -> Result<bool, FsError>;
}

/// The production fan-out: one proxied call per operation.
pub struct RpcCommandFanout;

#[async_trait]
impl CommandFanout for RpcCommandFanout {
    async fn create(&self, target: &StorageRef, path: &Path) -> Result<bool, FsError> {
        CommandClient::new(target.command).create(path).await
    }

    async fn delete(&self, target: &StorageRef, path: &Path) -> Result<bool, FsError> {
        CommandClient::new(target.command).delete(path).await
    }

    async fn copy(
        &self,
        target: &StorageRef,
        path: &Path,
        source: &StorageRef,
    ) -> Result<bool, FsError> {
        CommandClient::new(target.command)
            .copy(path, source.storage)
            .await
    }
}
