//! Integration and property-test scaffolding for spanfs.
//!
//! The [`harness`] module spins up a real naming server and real storage
//! servers on ephemeral localhost ports, each storage server backed by a
//! temporary directory. The test suites in `tests/` drive the system
//! through the same typed clients production callers use.

pub mod harness;

pub use harness::{RecordingFanout, StorageNode, TestCluster};
