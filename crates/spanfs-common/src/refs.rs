//! Storage-server references.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// The endpoint pair identifying one storage server: the client-facing
/// storage interface and the naming-server-facing command interface.
///
/// Two references are equal iff both endpoints are equal. The naming
/// server keeps registered references in registration order and file
/// nodes hold them by value; there is no ownership relation between the
/// two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRef {
    /// Address of the storage (client) interface.
    pub storage: SocketAddr,
    /// Address of the command interface.
    pub command: SocketAddr,
}

impl StorageRef {
    /// Creates a reference from the two interface addresses.
    pub fn new(storage: SocketAddr, command: SocketAddr) -> Self {
        StorageRef { storage, command }
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage={} command={}", self.storage, self.command)
    }
}
