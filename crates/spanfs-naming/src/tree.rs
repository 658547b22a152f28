//! The in-memory directory tree.
//!
//! Each node is either a directory owning a map of named children or a
//! file owning a non-empty list of storage replicas. Every node also
//! owns a [`PathLock`]; the root is a directory and is itself lockable.
//!
//! Locking a path takes a shared lock on every ancestor from the root
//! down, then the target in the requested mode, and releases in exact
//! reverse order. Combined with the total order on paths this prevents
//! deadlock between clients that lock multiple paths in ascending
//! order. The acquired stack is tracked explicitly so a failed walk
//! releases precisely what it took.
//!
//! Locking a file has replica side effects: an exclusive acquisition
//! invalidates every replica but the first, and repeated shared
//! acquisitions of a single-replica file mint a new replica on another
//! registered server.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use spanfs_common::{FsError, Path, Result, StorageRef};
use tracing::{debug, warn};

use crate::fanout::CommandFanout;
use crate::lock::PathLock;
use crate::registry::Registry;

/// Shared acquisitions of a single-replica file before a second replica
/// is minted. The trigger is deliberately coarse; replicating on every
/// read fans out far too eagerly.
pub const DEFAULT_REPLICATE_AFTER: u32 = 20;

struct Node {
    lock: PathLock,
    kind: NodeKind,
}

enum NodeKind {
    Directory(RwLock<HashMap<String, Arc<Node>>>),
    File(Mutex<FileMeta>),
}

struct FileMeta {
    /// Replicas hosting this file; never empty.
    replicas: Vec<StorageRef>,
    /// Rotation cursor for `get_storage`.
    next: usize,
    /// Shared acquisitions since the file last had one replica minted
    /// or invalidated.
    reads: u32,
}

impl Node {
    fn new_directory() -> Arc<Node> {
        Arc::new(Node {
            lock: PathLock::new(),
            kind: NodeKind::Directory(RwLock::new(HashMap::new())),
        })
    }

    fn new_file(replica: StorageRef) -> Arc<Node> {
        Arc::new(Node {
            lock: PathLock::new(),
            kind: NodeKind::File(Mutex::new(FileMeta {
                replicas: vec![replica],
                next: 0,
                reads: 0,
            })),
        })
    }

    fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// Child by name; `None` if absent or if this node is a file.
    fn child(&self, name: &str) -> Option<Arc<Node>> {
        match &self.kind {
            NodeKind::Directory(children) => {
                children.read().expect("tree poisoned").get(name).cloned()
            }
            NodeKind::File(_) => None,
        }
    }
}

/// The naming server's directory tree.
pub struct HashTree {
    root: Arc<Node>,
    registry: Arc<Registry>,
    fanout: Arc<dyn CommandFanout>,
    replicate_after: u32,
}

impl HashTree {
    /// Creates an empty tree over the given registry and fan-out.
    pub fn new(registry: Arc<Registry>, fanout: Arc<dyn CommandFanout>) -> Self {
        Self::with_replicate_after(registry, fanout, DEFAULT_REPLICATE_AFTER)
    }

    /// Creates a tree with a custom replication trigger threshold.
    pub fn with_replicate_after(
        registry: Arc<Registry>,
        fanout: Arc<dyn CommandFanout>,
        replicate_after: u32,
    ) -> Self {
        HashTree {
            root: Node::new_directory(),
            registry,
            fanout,
            replicate_after: replicate_after.max(1),
        }
    }

    fn resolve(&self, path: &Path) -> Result<Arc<Node>> {
        let mut node = self.root.clone();
        for component in path.components() {
            match node.child(component) {
                Some(next) => node = next,
                None => return Err(FsError::not_found(path.to_string())),
            }
        }
        Ok(node)
    }

    /// Walks root → target taking shared locks on every ancestor and the
    /// requested mode on the target. On a missing component the locks
    /// taken so far are released in reverse and the walk fails.
    async fn acquire_chain(&self, path: &Path, exclusive: bool) -> Result<Vec<Arc<Node>>> {
        let mut held: Vec<Arc<Node>> = Vec::new();
        let mut node = self.root.clone();
        for component in path.components() {
            node.lock.acquire(false).await;
            held.push(node.clone());
            match node.child(component) {
                Some(next) => node = next,
                None => {
                    for ancestor in held.iter().rev() {
                        ancestor.lock.release(false);
                    }
                    return Err(FsError::not_found(path.to_string()));
                }
            }
        }
        node.lock.acquire(exclusive).await;
        held.push(node);
        Ok(held)
    }

    /// Locks `path`, applying the replica side effects of a client lock.
    pub async fn lock(&self, path: &Path, exclusive: bool) -> Result<()> {
        let chain = self.acquire_chain(path, exclusive).await?;
        let target = chain.last().expect("chain includes the target");
        if let NodeKind::File(meta) = &target.kind {
            if exclusive {
                self.invalidate_stale_replicas(path, meta).await;
            } else {
                self.maybe_replicate(path, meta).await;
            }
        }
        Ok(())
    }

    /// Locks `path` without replica side effects. Used for the lock
    /// steps of naming-server operations, which must not feed the
    /// read-replication counter.
    pub async fn lock_plain(&self, path: &Path, exclusive: bool) -> Result<()> {
        self.acquire_chain(path, exclusive).await.map(|_| ())
    }

    /// Releases the locks taken by a matching `lock` call: the target in
    /// its mode first, then the ancestors in reverse acquisition order.
    pub fn unlock(&self, path: &Path, exclusive: bool) -> Result<()> {
        let mut chain = vec![self.root.clone()];
        let mut node = self.root.clone();
        for component in path.components() {
            match node.child(component) {
                Some(next) => {
                    chain.push(next.clone());
                    node = next;
                }
                None => {
                    return Err(FsError::invalid(format!("path {} is not locked", path)))
                }
            }
        }
        let target = chain.pop().expect("chain includes the target");
        target.lock.release(exclusive);
        for ancestor in chain.iter().rev() {
            ancestor.lock.release(false);
        }
        Ok(())
    }

    /// True if `path` names a directory, false for a file.
    pub fn is_directory(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path)?.is_directory())
    }

    /// Sorted child names of the directory at `path`.
    pub fn list(&self, path: &Path) -> Result<Vec<String>> {
        let node = self.resolve(path)?;
        match &node.kind {
            NodeKind::Directory(children) => {
                let mut names: Vec<String> = children
                    .read()
                    .expect("tree poisoned")
                    .keys()
                    .cloned()
                    .collect();
                names.sort();
                Ok(names)
            }
            NodeKind::File(_) => Err(FsError::not_found(format!(
                "{} is not a directory",
                path
            ))),
        }
    }

    /// Inserts a file node with `replica` as its sole host. The parent
    /// must already exist and be a directory; the caller holds it
    /// exclusively. Returns false if the name is taken.
    pub fn create_file(&self, path: &Path, replica: StorageRef) -> Result<bool> {
        self.create_node(path, || Node::new_file(replica))
    }

    /// Inserts an empty directory node. Same contract as `create_file`.
    pub fn create_directory(&self, path: &Path) -> Result<bool> {
        self.create_node(path, Node::new_directory)
    }

    fn create_node(&self, path: &Path, make: impl FnOnce() -> Arc<Node>) -> Result<bool> {
        let (parent, name) = match (path.parent(), path.last()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Ok(false), // the root cannot be created
        };
        let parent_node = self.resolve(&parent)?;
        match &parent_node.kind {
            NodeKind::Directory(children) => {
                let mut map = children.write().expect("tree poisoned");
                if map.contains_key(&name) {
                    return Ok(false);
                }
                map.insert(name, make());
                Ok(true)
            }
            NodeKind::File(_) => Err(FsError::not_found(format!(
                "parent {} is not a directory",
                parent
            ))),
        }
    }

    /// Removes the tree entry at `path` without touching storage
    /// servers. Rollback path for a failed `create_file`.
    pub(crate) fn unlink(&self, path: &Path) -> Result<bool> {
        let (parent, name) = match (path.parent(), path.last()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return Ok(false),
        };
        let parent_node = self.resolve(&parent)?;
        match &parent_node.kind {
            NodeKind::Directory(children) => Ok(children
                .write()
                .expect("tree poisoned")
                .remove(name)
                .is_some()),
            NodeKind::File(_) => Ok(false),
        }
    }

    /// Deletes the subtree at `path`, telling every storage server that
    /// hosts any part of it to delete `path` locally. The caller holds
    /// the parent exclusively. The root is never deleted.
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        let (parent, name) = match (path.parent(), path.last()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Ok(false),
        };
        let parent_node = self.resolve(&parent)?;
        let target = parent_node
            .child(&name)
            .ok_or_else(|| FsError::not_found(path.to_string()))?;

        let mut hosts = HashSet::new();
        collect_refs(&target, &mut hosts);

        // Storage-side deletion is best effort; the tree entry goes away
        // regardless, and a failed server rediscovers the orphan on its
        // next registration.
        for host in &hosts {
            match self.fanout.delete(host, path).await {
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path, host = %host, error = %e, "storage delete failed")
                }
            }
        }

        if let NodeKind::Directory(children) = &parent_node.kind {
            children.write().expect("tree poisoned").remove(&name);
        }
        Ok(true)
    }

    /// The storage server to read `path` from, rotating through the
    /// file's replicas. The caller holds the file's shared lock; the
    /// cursor itself is guarded by the node, so rotation is only
    /// approximately round-robin under contention.
    pub fn get_storage(&self, path: &Path) -> Result<StorageRef> {
        let node = self.resolve(path)?;
        match &node.kind {
            NodeKind::File(meta) => {
                let mut meta = meta.lock().expect("file meta poisoned");
                let index = meta.next % meta.replicas.len();
                meta.next = meta.next.wrapping_add(1);
                Ok(meta.replicas[index])
            }
            NodeKind::Directory(_) => Err(FsError::not_found(format!(
                "{} is not a file",
                path
            ))),
        }
    }

    /// Current replica list of the file at `path`.
    pub fn replicas(&self, path: &Path) -> Result<Vec<StorageRef>> {
        let node = self.resolve(path)?;
        match &node.kind {
            NodeKind::File(meta) => Ok(meta.lock().expect("file meta poisoned").replicas.clone()),
            NodeKind::Directory(_) => Err(FsError::not_found(format!(
                "{} is not a file",
                path
            ))),
        }
    }

    /// Grafts the files hosted by a newly registered server into the
    /// tree, creating missing intermediate directories. Returns the
    /// paths that could not be claimed (already present, shadowed by a
    /// file, or the root), which the server must delete locally.
    pub fn register_files(&self, server: StorageRef, paths: &[Path]) -> Vec<Path> {
        let mut duplicates = Vec::new();
        for path in paths {
            if !self.graft(path, server) {
                duplicates.push(path.clone());
            }
        }
        duplicates
    }

    fn graft(&self, path: &Path, server: StorageRef) -> bool {
        let components: Vec<&str> = path.components().collect();
        let Some((leaf, ancestors)) = components.split_last() else {
            return false; // the root is never new
        };

        let mut node = self.root.clone();
        for component in ancestors {
            let next = match &node.kind {
                NodeKind::Directory(children) => children
                    .write()
                    .expect("tree poisoned")
                    .entry(component.to_string())
                    .or_insert_with(Node::new_directory)
                    .clone(),
                NodeKind::File(_) => return false,
            };
            if !next.is_directory() {
                return false; // an existing file shadows the path
            }
            node = next;
        }

        match &node.kind {
            NodeKind::Directory(children) => {
                let mut map = children.write().expect("tree poisoned");
                if map.contains_key(*leaf) {
                    return false;
                }
                map.insert(leaf.to_string(), Node::new_file(server));
                true
            }
            NodeKind::File(_) => false,
        }
    }

    /// Trims the file's replica list to its first entry, issuing a
    /// best-effort delete to every other host. Runs under the file's
    /// exclusive lock, before the caller observes it.
    async fn invalidate_stale_replicas(&self, path: &Path, meta: &Mutex<FileMeta>) {
        let stale = {
            let mut meta = meta.lock().expect("file meta poisoned");
            meta.reads = 0;
            if meta.replicas.len() <= 1 {
                return;
            }
            meta.next = 0;
            meta.replicas.split_off(1)
        };
        for host in stale {
            debug!(path = %path, host = %host, "invalidating stale replica");
            if let Err(e) = self.fanout.delete(&host, path).await {
                warn!(path = %path, host = %host, error = %e, "stale replica delete failed");
            }
        }
    }

    /// Counts a shared acquisition and, once a single-replica file has
    /// been read often enough, mints a copy on an unused server. Copy
    /// failures are logged and swallowed; the caller never waits on a
    /// retry.
    async fn maybe_replicate(&self, path: &Path, meta: &Mutex<FileMeta>) {
        let primary = {
            let mut meta = meta.lock().expect("file meta poisoned");
            meta.reads += 1;
            if meta.replicas.len() != 1 || meta.reads < self.replicate_after {
                return;
            }
            // Claim the mint now so concurrent readers start a fresh count
            // instead of racing to copy the same file.
            meta.reads = 0;
            meta.replicas[0]
        };

        let Some(target) = self.registry.pick_unused(&[primary]) else {
            return;
        };
        match self.fanout.copy(&target, path, &primary).await {
            Ok(true) => {
                let mut meta = meta.lock().expect("file meta poisoned");
                if meta.replicas.len() == 1 && !meta.replicas.contains(&target) {
                    debug!(path = %path, host = %target, "minted replica");
                    meta.replicas.push(target);
                }
            }
            Ok(false) => warn!(path = %path, host = %target, "replica copy refused"),
            Err(e) => warn!(path = %path, host = %target, error = %e, "replica copy failed"),
        }
    }
}

fn collect_refs(node: &Arc<Node>, out: &mut HashSet<StorageRef>) {
    match &node.kind {
        NodeKind::File(meta) => {
            out.extend(meta.lock().expect("file meta poisoned").replicas.iter().copied());
        }
        NodeKind::Directory(children) => {
            for child in children.read().expect("tree poisoned").values() {
                collect_refs(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::SocketAddr;

    fn stref(n: u16) -> StorageRef {
        let a: SocketAddr = format!("127.0.0.1:{}", 7000 + n).parse().unwrap();
        let b: SocketAddr = format!("127.0.0.1:{}", 8000 + n).parse().unwrap();
        StorageRef::new(a, b)
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    /// Records every outbound command instead of talking to a socket.
    struct RecordingFanout {
        calls: Mutex<Vec<(String, StorageRef, Path)>>,
        copy_result: bool,
    }

    impl RecordingFanout {
        fn new() -> Arc<Self> {
            Arc::new(RecordingFanout {
                calls: Mutex::new(Vec::new()),
                copy_result: true,
            })
        }

        fn calls_named(&self, op: &str) -> Vec<(StorageRef, Path)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _, _)| name == op)
                .map(|(_, s, p)| (*s, p.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl CommandFanout for RecordingFanout {
        async fn create(&self, target: &StorageRef, path: &Path) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(("create".into(), *target, path.clone()));
            Ok(true)
        }

        async fn delete(&self, target: &StorageRef, path: &Path) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(("delete".into(), *target, path.clone()));
            Ok(true)
        }

        async fn copy(
            &self,
            target: &StorageRef,
            path: &Path,
            _source: &StorageRef,
        ) -> Result<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(("copy".into(), *target, path.clone()));
            Ok(self.copy_result)
        }
    }

    fn tree_with(
        replicate_after: u32,
    ) -> (HashTree, Arc<Registry>, Arc<RecordingFanout>) {
        let registry = Arc::new(Registry::new());
        let fanout = RecordingFanout::new();
        let tree =
            HashTree::with_replicate_after(registry.clone(), fanout.clone(), replicate_after);
        (tree, registry, fanout)
    }

    #[tokio::test]
    async fn test_register_files_builds_tree() {
        let (tree, _, _) = tree_with(20);
        let dups = tree.register_files(
            stref(1),
            &[path("/a/b.txt"), path("/c/d.txt")],
        );
        assert!(dups.is_empty());
        assert_eq!(tree.list(&Path::root()).unwrap(), vec!["a", "c"]);
        assert!(tree.is_directory(&path("/a")).unwrap());
        assert!(!tree.is_directory(&path("/a/b.txt")).unwrap());
    }

    #[tokio::test]
    async fn test_register_files_reports_duplicates() {
        let (tree, _, _) = tree_with(20);
        assert!(tree.register_files(stref(1), &[path("/x")]).is_empty());
        let dups = tree.register_files(stref(2), &[path("/x"), path("/y")]);
        assert_eq!(dups, vec![path("/x")]);
        // The losing claim does not join the replica list.
        assert_eq!(tree.replicas(&path("/x")).unwrap(), vec![stref(1)]);
    }

    #[tokio::test]
    async fn test_register_root_is_always_duplicate() {
        let (tree, _, _) = tree_with(20);
        let dups = tree.register_files(stref(1), &[Path::root()]);
        assert_eq!(dups, vec![Path::root()]);
    }

    #[tokio::test]
    async fn test_register_under_file_is_duplicate() {
        let (tree, _, _) = tree_with(20);
        assert!(tree.register_files(stref(1), &[path("/a")]).is_empty());
        let dups = tree.register_files(stref(2), &[path("/a/b.txt")]);
        assert_eq!(dups, vec![path("/a/b.txt")]);
    }

    #[tokio::test]
    async fn test_create_file_requires_existing_parent() {
        let (tree, _, _) = tree_with(20);
        match tree.create_file(&path("/missing/f.txt"), stref(1)) {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(tree.create_directory(&path("/missing")).unwrap());
        assert!(tree.create_file(&path("/missing/f.txt"), stref(1)).unwrap());
        // Second creation of the same name reports false.
        assert!(!tree.create_file(&path("/missing/f.txt"), stref(1)).unwrap());
    }

    #[tokio::test]
    async fn test_get_storage_rotates_over_replicas() {
        let (tree, registry, _) = tree_with(1);
        registry.add(stref(1)).unwrap();
        registry.add(stref(2)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);

        // Single replica: every rotation lands on the primary.
        assert_eq!(tree.get_storage(&path("/x")).unwrap(), stref(1));
        assert_eq!(tree.get_storage(&path("/x")).unwrap(), stref(1));

        // Mint a second replica, then rotation alternates.
        tree.lock(&path("/x"), false).await.unwrap();
        tree.unlock(&path("/x"), false).unwrap();
        assert_eq!(tree.replicas(&path("/x")).unwrap().len(), 2);
        let first = tree.get_storage(&path("/x")).unwrap();
        let second = tree.get_storage(&path("/x")).unwrap();
        assert_ne!(first, second);
        assert_eq!(tree.get_storage(&path("/x")).unwrap(), first);
    }

    #[tokio::test]
    async fn test_exclusive_lock_invalidates_stale_replicas() {
        let (tree, registry, fanout) = tree_with(1);
        registry.add(stref(1)).unwrap();
        registry.add(stref(2)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);

        // One shared acquisition past the threshold mints the replica.
        tree.lock(&path("/x"), false).await.unwrap();
        tree.unlock(&path("/x"), false).unwrap();
        assert_eq!(tree.replicas(&path("/x")).unwrap(), vec![stref(1), stref(2)]);
        assert_eq!(fanout.calls_named("copy").len(), 1);

        // Exclusive acquisition trims back to the primary and deletes the
        // stale copy.
        tree.lock(&path("/x"), true).await.unwrap();
        tree.unlock(&path("/x"), true).unwrap();
        assert_eq!(tree.replicas(&path("/x")).unwrap(), vec![stref(1)]);
        assert_eq!(fanout.calls_named("delete"), vec![(stref(2), path("/x"))]);
    }

    #[tokio::test]
    async fn test_replication_waits_for_threshold() {
        let (tree, registry, fanout) = tree_with(3);
        registry.add(stref(1)).unwrap();
        registry.add(stref(2)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);

        for _ in 0..2 {
            tree.lock(&path("/x"), false).await.unwrap();
            tree.unlock(&path("/x"), false).unwrap();
        }
        assert!(fanout.calls_named("copy").is_empty());

        tree.lock(&path("/x"), false).await.unwrap();
        tree.unlock(&path("/x"), false).unwrap();
        assert_eq!(fanout.calls_named("copy").len(), 1);
        assert_eq!(tree.replicas(&path("/x")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_replication_without_spare_server() {
        let (tree, registry, fanout) = tree_with(1);
        registry.add(stref(1)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);

        tree.lock(&path("/x"), false).await.unwrap();
        tree.unlock(&path("/x"), false).unwrap();
        assert!(fanout.calls_named("copy").is_empty());
        assert_eq!(tree.replicas(&path("/x")).unwrap(), vec![stref(1)]);
    }

    #[tokio::test]
    async fn test_plain_lock_does_not_feed_replication() {
        let (tree, registry, fanout) = tree_with(1);
        registry.add(stref(1)).unwrap();
        registry.add(stref(2)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);

        for _ in 0..5 {
            tree.lock_plain(&path("/x"), false).await.unwrap();
            tree.unlock(&path("/x"), false).unwrap();
        }
        assert!(fanout.calls_named("copy").is_empty());
    }

    #[tokio::test]
    async fn test_lock_missing_path_releases_ancestors() {
        let (tree, _, _) = tree_with(20);
        tree.register_files(stref(1), &[path("/a/b.txt")]);

        match tree.lock(&path("/a/missing"), true).await {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
        // The failed walk must have released /a and the root: an
        // exclusive lock on /a succeeds immediately.
        tree.lock(&path("/a"), true).await.unwrap();
        tree.unlock(&path("/a"), true).unwrap();
    }

    #[tokio::test]
    async fn test_unlock_unknown_path_is_invalid() {
        let (tree, _, _) = tree_with(20);
        match tree.unlock(&path("/nope"), false) {
            Err(FsError::InvalidArgument(_)) => {}
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_file_notifies_all_replicas() {
        let (tree, registry, fanout) = tree_with(1);
        registry.add(stref(1)).unwrap();
        registry.add(stref(2)).unwrap();
        tree.register_files(stref(1), &[path("/x")]);
        tree.lock(&path("/x"), false).await.unwrap();
        tree.unlock(&path("/x"), false).unwrap();
        assert_eq!(tree.replicas(&path("/x")).unwrap().len(), 2);

        assert!(tree.delete(&path("/x")).await.unwrap());
        let deleted: HashSet<StorageRef> = fanout
            .calls_named("delete")
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(deleted, HashSet::from([stref(1), stref(2)]));
        assert!(tree.resolve(&path("/x")).is_err());
    }

    #[tokio::test]
    async fn test_delete_directory_collects_subtree_hosts() {
        let (tree, _, fanout) = tree_with(20);
        tree.register_files(stref(1), &[path("/d/a.txt")]);
        tree.register_files(stref(2), &[path("/d/b.txt")]);

        assert!(tree.delete(&path("/d")).await.unwrap());
        let hosts: HashSet<StorageRef> = fanout
            .calls_named("delete")
            .into_iter()
            .map(|(s, p)| {
                assert_eq!(p, path("/d"));
                s
            })
            .collect();
        assert_eq!(hosts, HashSet::from([stref(1), stref(2)]));
        assert_eq!(tree.list(&Path::root()).unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_delete_root_refused() {
        let (tree, _, _) = tree_with(20);
        assert!(!tree.delete(&Path::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_root_lockable_both_modes() {
        let (tree, _, _) = tree_with(20);
        tree.lock(&Path::root(), true).await.unwrap();
        tree.unlock(&Path::root(), true).unwrap();
        tree.lock(&Path::root(), false).await.unwrap();
        tree.lock(&Path::root(), false).await.unwrap();
        tree.unlock(&Path::root(), false).unwrap();
        tree.unlock(&Path::root(), false).unwrap();
    }

    #[tokio::test]
    async fn test_exclusive_lock_holds_off_second_writer() {
        let (tree, _, _) = tree_with(20);
        tree.register_files(stref(1), &[path("/x")]);
        let tree = Arc::new(tree);

        tree.lock(&path("/x"), true).await.unwrap();
        let contender = {
            let tree = tree.clone();
            tokio::spawn(async move {
                tree.lock(&path("/x"), true).await.unwrap();
                tree.unlock(&path("/x"), true).unwrap();
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        tree.unlock(&path("/x"), true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }
}
