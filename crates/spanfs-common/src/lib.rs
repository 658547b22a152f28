#![warn(missing_docs)]

//! Shared types for the spanfs distributed filesystem.
//!
//! Every spanfs component speaks in terms of the types defined here:
//! - [`Path`]: the immutable hierarchical file name used by all interfaces
//! - [`StorageRef`]: the endpoint pair identifying one storage server
//! - [`FsError`]: the error taxonomy that round-trips the wire

pub mod error;
pub mod path;
pub mod refs;

pub use error::{FsError, Result};
pub use path::Path;
pub use refs::StorageRef;
