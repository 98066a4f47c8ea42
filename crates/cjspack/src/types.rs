//! Shared type definitions for the cjspack crate
//!
//! Types used by several components (resolver, graph, plan, emitter) live here
//! to keep the dependency direction between those modules one-way.

use std::{
    fmt,
    hash::BuildHasherDefault,
    path::{Component, Path},
};

use indexmap::IndexMap;
use rustc_hash::FxHasher;

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Canonical identity of a module inside a bundle
///
/// Keys are derived from the symlink-resolved absolute path of a file, made
/// relative to the project root and written with forward slashes
/// (e.g. `./math/add.js`, `../shared/util.js`). Two specifiers that reach the
/// same file always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(String);

impl ModulePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the key for `path` relative to `root`. Both paths are expected to
    /// be canonical already. Returns `None` when a component below `root` is
    /// not valid UTF-8, since it could not be named without losing bytes.
    pub(crate) fn relative_to(root: &Path, path: &Path) -> Option<Self> {
        let root_parts: Vec<Component<'_>> = root.components().collect();
        let path_parts: Vec<Component<'_>> = path.components().collect();
        let common = root_parts
            .iter()
            .zip(&path_parts)
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<String> = Vec::new();
        for _ in common..root_parts.len() {
            segments.push("..".to_owned());
        }
        for part in &path_parts[common..] {
            segments.push(part.as_os_str().to_str()?.to_owned());
        }

        let joined = segments.join("/");
        if common < root_parts.len() {
            Some(Self(joined))
        } else {
            Some(Self(format!("./{joined}")))
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModulePath {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
