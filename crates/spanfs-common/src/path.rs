//! Distributed filesystem paths.
//!
//! A [`Path`] is an immutable sequence of non-empty components naming a
//! file or directory in the spanfs tree. The string form is
//! forward-slash delimited; the root directory is `"/"`. The colon is
//! reserved as a delimiter for application use and the forward slash is
//! the component separator, so neither may appear inside a component.
//!
//! Paths carry a total order (componentwise lexicographic) used by
//! clients that must hold several paths locked at once: locking in
//! increasing path order prevents deadlocks between such clients.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};

/// An immutable hierarchical path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory.
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Parses a path from its string form.
    ///
    /// The string must begin with a forward slash and must not contain a
    /// colon. Empty components (from doubled or trailing slashes) are
    /// dropped, so `"/a//b/"` parses the same as `"/a/b"`.
    pub fn parse(s: &str) -> Result<Self> {
        if !s.starts_with('/') {
            return Err(FsError::invalid(format!(
                "path {:?} does not begin with '/'",
                s
            )));
        }
        if s.contains(':') {
            return Err(FsError::invalid(format!("path {:?} contains ':'", s)));
        }
        let components = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Path { components })
    }

    /// Returns a new path with `component` appended.
    ///
    /// The component must be non-empty and free of `/` and `:`.
    pub fn child(&self, component: &str) -> Result<Self> {
        if component.is_empty() {
            return Err(FsError::invalid("path component is empty"));
        }
        if component.contains('/') || component.contains(':') {
            return Err(FsError::invalid(format!(
                "path component {:?} contains a reserved character",
                component
            )));
        }
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Path { components })
    }

    /// True if this path is the root directory.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The parent of this path, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Path {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The last component, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// True iff `prefix` is a prefix of this path, including equality.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        if prefix.components.len() > self.components.len() {
            return false;
        }
        self.components
            .iter()
            .zip(&prefix.components)
            .all(|(a, b)| a == b)
    }

    /// Iterates over the components in order, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Number of components (the root has zero).
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Maps this path to a location under a local filesystem root, so
    /// `/a/b` becomes `root/a/b`.
    pub fn to_local(&self, root: &std::path::Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for c in &self.components {
            out.push(c);
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let path = p("/home/user/file.txt");
        let comps: Vec<&str> = path.components().collect();
        assert_eq!(comps, vec!["home", "user", "file.txt"]);
    }

    #[test]
    fn test_parse_root() {
        assert!(p("/").is_root());
        assert_eq!(p("/"), Path::root());
    }

    #[test]
    fn test_parse_drops_empty_components() {
        assert_eq!(p("/a//b///c/"), p("/a/b/c"));
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(Path::parse("a/b").is_err());
        assert!(Path::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_colon() {
        assert!(Path::parse("/a:b").is_err());
    }

    #[test]
    fn test_child_rejects_reserved() {
        let root = Path::root();
        assert!(root.child("").is_err());
        assert!(root.child("a/b").is_err());
        assert!(root.child("a:b").is_err());
        assert_eq!(root.child("a").unwrap(), p("/a"));
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["/", "/a", "/a/b/c.txt"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn test_parent_and_last() {
        let path = p("/a/b/c");
        assert_eq!(path.parent(), Some(p("/a/b")));
        assert_eq!(path.last(), Some("c"));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(Path::root().last(), None);
        assert_eq!(p("/a").parent(), Some(Path::root()));
    }

    #[test]
    fn test_starts_with() {
        let path = p("/a/b/c");
        assert!(path.starts_with(&Path::root()));
        assert!(path.starts_with(&p("/a")));
        assert!(path.starts_with(&p("/a/b")));
        assert!(path.starts_with(&path));
        assert!(!path.starts_with(&p("/a/x")));
        assert!(!path.starts_with(&p("/a/b/c/d")));
        assert!(!p("/a").starts_with(&p("/b")));
    }

    #[test]
    fn test_ordering_is_componentwise() {
        assert!(p("/a") < p("/a/b"));
        assert!(p("/a/b") < p("/b"));
        assert!(p("/bin/cat") < p("/etc"));
        assert!(p("/etc") < p("/etc/dfs/conf.txt"));
        assert!(Path::root() < p("/a"));
    }

    #[test]
    fn test_to_local() {
        let root = std::path::Path::new("/srv/data");
        assert_eq!(p("/a/b").to_local(root), PathBuf::from("/srv/data/a/b"));
        assert_eq!(Path::root().to_local(root), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let path = p("/a/b/c.txt");
        let bytes = bincode::serialize(&path).unwrap();
        let back: Path = bincode::deserialize(&bytes).unwrap();
        assert_eq!(path, back);
    }

    fn component_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9._-]{1,12}"
    }

    fn path_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(component_strategy(), 0..6)
    }

    proptest! {
        #[test]
        fn prop_string_roundtrip(comps in path_strategy()) {
            let s = if comps.is_empty() {
                "/".to_string()
            } else {
                format!("/{}", comps.join("/"))
            };
            let path = Path::parse(&s).unwrap();
            prop_assert_eq!(path.to_string(), s);
            let recomposed: Vec<String> =
                path.components().map(str::to_string).collect();
            prop_assert_eq!(recomposed, comps);
        }

        #[test]
        fn prop_reparse_is_identity(comps in path_strategy()) {
            let mut path = Path::root();
            for c in &comps {
                path = path.child(c).unwrap();
            }
            prop_assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
        }

        #[test]
        fn prop_starts_with_reflexive(comps in path_strategy()) {
            let mut path = Path::root();
            for c in &comps {
                path = path.child(c).unwrap();
            }
            prop_assert!(path.starts_with(&path));
        }

        #[test]
        fn prop_starts_with_transitive(
            a in path_strategy(),
            b in path_strategy(),
            c in path_strategy(),
        ) {
            // Build r ⊇ q ⊇ p by construction, then check transitivity
            // through the public predicate.
            let mut p_path = Path::root();
            for comp in &a {
                p_path = p_path.child(comp).unwrap();
            }
            let mut q_path = p_path.clone();
            for comp in &b {
                q_path = q_path.child(comp).unwrap();
            }
            let mut r_path = q_path.clone();
            for comp in &c {
                r_path = r_path.child(comp).unwrap();
            }
            prop_assert!(q_path.starts_with(&p_path));
            prop_assert!(r_path.starts_with(&q_path));
            prop_assert!(r_path.starts_with(&p_path));
        }

        #[test]
        fn prop_parent_drops_last(comps in path_strategy()) {
            let mut path = Path::root();
            for c in &comps {
                path = path.child(c).unwrap();
            }
            if comps.is_empty() {
                prop_assert!(path.parent().is_none());
            } else {
                let parent = path.parent().unwrap();
                prop_assert_eq!(parent.depth(), path.depth() - 1);
                prop_assert!(path.starts_with(&parent));
                prop_assert_eq!(path.last().unwrap(), comps.last().unwrap().as_str());
            }
        }
    }
}
