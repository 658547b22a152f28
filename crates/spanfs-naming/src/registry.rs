//! Registry of storage servers known to the naming server.
//!
//! The registry is the authoritative owner of [`StorageRef`] identities:
//! file nodes hold copies, never lifetime ownership. Entries are kept in
//! registration order and never removed; the protocol has no
//! unregistration.

use std::sync::Mutex;

use rand::Rng;
use spanfs_common::{FsError, Result, StorageRef};

/// The ordered set of registered storage servers.
pub struct Registry {
    servers: Mutex<Vec<StorageRef>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry {
            servers: Mutex::new(Vec::new()),
        }
    }

    /// Appends a storage server. Fails with `AlreadyRegistered` if an
    /// equal reference is present.
    pub fn add(&self, server: StorageRef) -> Result<()> {
        let mut servers = self.servers.lock().expect("registry poisoned");
        if servers.contains(&server) {
            return Err(FsError::AlreadyRegistered(server.to_string()));
        }
        servers.push(server);
        Ok(())
    }

    /// True if an equal reference is registered.
    pub fn contains(&self, server: &StorageRef) -> bool {
        self.servers
            .lock()
            .expect("registry poisoned")
            .contains(server)
    }

    /// Picks a server uniformly at random. New files are spread this
    /// way; load is not observed, so uniform is as good as anything.
    pub fn pick_random(&self) -> Result<StorageRef> {
        let servers = self.servers.lock().expect("registry poisoned");
        if servers.is_empty() {
            return Err(FsError::not_found("no storage servers registered"));
        }
        let index = rand::thread_rng().gen_range(0..servers.len());
        Ok(servers[index])
    }

    /// Picks a random server that is not in `used`, if one exists.
    pub fn pick_unused(&self, used: &[StorageRef]) -> Option<StorageRef> {
        let servers = self.servers.lock().expect("registry poisoned");
        let candidates: Vec<StorageRef> = servers
            .iter()
            .filter(|s| !used.contains(s))
            .copied()
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index])
    }

    /// All registered servers in registration order.
    pub fn all(&self) -> Vec<StorageRef> {
        self.servers.lock().expect("registry poisoned").clone()
    }

    /// Number of registered servers.
    pub fn len(&self) -> usize {
        self.servers.lock().expect("registry poisoned").len()
    }

    /// True if no server has registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn stref(p1: u16, p2: u16) -> StorageRef {
        let a: SocketAddr = format!("127.0.0.1:{}", p1).parse().unwrap();
        let b: SocketAddr = format!("127.0.0.1:{}", p2).parse().unwrap();
        StorageRef::new(a, b)
    }

    #[test]
    fn test_add_preserves_registration_order() {
        let reg = Registry::new();
        reg.add(stref(1, 2)).unwrap();
        reg.add(stref(3, 4)).unwrap();
        assert_eq!(reg.all(), vec![stref(1, 2), stref(3, 4)]);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let reg = Registry::new();
        reg.add(stref(1, 2)).unwrap();
        match reg.add(stref(1, 2)) {
            Err(FsError::AlreadyRegistered(_)) => {}
            other => panic!("expected AlreadyRegistered, got {:?}", other),
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_distinct_command_port_is_distinct_server() {
        let reg = Registry::new();
        reg.add(stref(1, 2)).unwrap();
        reg.add(stref(1, 3)).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_pick_random_empty_is_not_found() {
        let reg = Registry::new();
        match reg.pick_random() {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_pick_random_returns_registered() {
        let reg = Registry::new();
        reg.add(stref(1, 2)).unwrap();
        reg.add(stref(3, 4)).unwrap();
        for _ in 0..20 {
            let picked = reg.pick_random().unwrap();
            assert!(reg.contains(&picked));
        }
    }

    #[test]
    fn test_pick_unused_skips_used() {
        let reg = Registry::new();
        reg.add(stref(1, 2)).unwrap();
        reg.add(stref(3, 4)).unwrap();
        let picked = reg.pick_unused(&[stref(1, 2)]).unwrap();
        assert_eq!(picked, stref(3, 4));
        assert!(reg.pick_unused(&[stref(1, 2), stref(3, 4)]).is_none());
    }
}
