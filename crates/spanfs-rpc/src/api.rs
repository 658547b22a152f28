//! Contracts for the four spanfs remote interfaces.
//!
//! Each interface gets a module holding its name, the method tags and
//! parameter descriptors written into call frames, and the serde request
//! types. Clients ([`crate::client`]) and the server-side dispatchers in
//! the naming and storage crates are written against these constants so
//! the two sides cannot drift apart.
//!
//! Every operation of these interfaces can also fail with
//! [`FsError::Remote`](spanfs_common::FsError); that is what makes them
//! remote interfaces.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use spanfs_common::Path;

/// Client-facing naming server interface.
pub mod service {
    use super::*;

    /// Interface name carried by proxies and listeners.
    pub const INTERFACE: &str = "Service";

    pub const LOCK: &str = "lock";
    pub const LOCK_PARAMS: &[&str] = &["Path", "bool"];
    pub const UNLOCK: &str = "unlock";
    pub const UNLOCK_PARAMS: &[&str] = &["Path", "bool"];
    pub const IS_DIRECTORY: &str = "is_directory";
    pub const IS_DIRECTORY_PARAMS: &[&str] = &["Path"];
    pub const LIST: &str = "list";
    pub const LIST_PARAMS: &[&str] = &["Path"];
    pub const CREATE_FILE: &str = "create_file";
    pub const CREATE_FILE_PARAMS: &[&str] = &["Path"];
    pub const CREATE_DIRECTORY: &str = "create_directory";
    pub const CREATE_DIRECTORY_PARAMS: &[&str] = &["Path"];
    pub const DELETE: &str = "delete";
    pub const DELETE_PARAMS: &[&str] = &["Path"];
    pub const GET_STORAGE: &str = "get_storage";
    pub const GET_STORAGE_PARAMS: &[&str] = &["Path"];

    /// Arguments of `lock` and `unlock`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct LockRequest {
        pub path: Path,
        pub exclusive: bool,
    }

    /// Arguments of the single-path queries and mutations.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PathRequest {
        pub path: Path,
    }
}

/// Storage-server-facing naming server interface.
pub mod registration {
    use super::*;

    /// Interface name carried by proxies and listeners.
    pub const INTERFACE: &str = "Registration";

    pub const REGISTER: &str = "register";
    pub const REGISTER_PARAMS: &[&str] = &["SocketAddr", "SocketAddr", "Vec<Path>"];

    /// Arguments of `register`: the two endpoints the storage server
    /// serves, plus every file it currently hosts. The reply is the list
    /// of paths the caller must delete locally before serving clients.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RegisterRequest {
        pub storage: SocketAddr,
        pub command: SocketAddr,
        pub paths: Vec<Path>,
    }
}

/// Client-facing storage server interface.
pub mod storage {
    use super::*;

    /// Interface name carried by proxies and listeners.
    pub const INTERFACE: &str = "Storage";

    pub const SIZE: &str = "size";
    pub const SIZE_PARAMS: &[&str] = &["Path"];
    pub const READ: &str = "read";
    pub const READ_PARAMS: &[&str] = &["Path", "u64", "u32"];
    pub const WRITE: &str = "write";
    pub const WRITE_PARAMS: &[&str] = &["Path", "u64", "Vec<u8>"];

    /// Arguments of `size`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SizeRequest {
        pub path: Path,
    }

    /// Arguments of `read`. Offset and length are validated against the
    /// file size on the servant.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ReadRequest {
        pub path: Path,
        pub offset: u64,
        pub length: u32,
    }

    /// Arguments of `write`. Writing past the end extends the file.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct WriteRequest {
        pub path: Path,
        pub offset: u64,
        pub data: Vec<u8>,
    }
}

/// Naming-server-facing storage server interface.
pub mod command {
    use super::*;

    /// Interface name carried by proxies and listeners.
    pub const INTERFACE: &str = "Command";

    pub const CREATE: &str = "create";
    pub const CREATE_PARAMS: &[&str] = &["Path"];
    pub const DELETE: &str = "delete";
    pub const DELETE_PARAMS: &[&str] = &["Path"];
    pub const COPY: &str = "copy";
    pub const COPY_PARAMS: &[&str] = &["Path", "SocketAddr"];

    /// Arguments of `create` and `delete`.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PathRequest {
        pub path: Path,
    }

    /// Arguments of `copy`: fetch `path` from the storage interface at
    /// `source` and write it locally.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CopyRequest {
        pub path: Path,
        pub source: SocketAddr,
    }
}
