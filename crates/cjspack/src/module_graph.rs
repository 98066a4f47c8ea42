//! Module graph: one record per resolved file, keyed by canonical path
//!
//! Records are complete when inserted (body, specifiers and their resolved
//! keys) and are never modified afterwards. Edges are mirrored in a petgraph
//! `DiGraph` so cycles can be reported after a build.

use std::path::PathBuf;

use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use rustc_hash::FxHashMap;

use crate::{
    error::{BundleError, Result},
    types::{FxIndexMap, ModulePath},
};

/// Everything known about one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Canonical key, unique within the graph
    pub path: ModulePath,
    /// Resolved file on disk
    pub file: PathBuf,
    /// Raw specifiers in source order
    pub dependency_specifiers: Vec<String>,
    /// Specifier to the key it resolved to
    pub resolved_dependencies: FxIndexMap<String, ModulePath>,
    /// Transformed module code
    pub body: String,
    /// SHA-256 of the source text (hex-encoded)
    pub content_hash: String,
}

#[derive(Debug)]
pub struct ModuleGraph {
    entry: ModulePath,
    /// Insertion order is discovery order
    modules: FxIndexMap<ModulePath, ModuleRecord>,
    graph: DiGraph<ModulePath, ()>,
    node_indices: FxHashMap<ModulePath, NodeIndex>,
}

impl ModuleGraph {
    pub(crate) fn new(entry: ModulePath) -> Self {
        Self {
            entry,
            modules: FxIndexMap::default(),
            graph: DiGraph::new(),
            node_indices: FxHashMap::default(),
        }
    }

    pub fn entry(&self) -> &ModulePath {
        &self.entry
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.modules.contains_key(path)
    }

    pub fn get(&self, path: &ModulePath) -> Option<&ModuleRecord> {
        self.modules.get(path)
    }

    /// Records in discovery order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// Insert a record. Returns `false` and leaves the graph untouched if a
    /// record with the same path already exists.
    pub(crate) fn insert(&mut self, record: ModuleRecord) -> bool {
        if self.modules.contains_key(&record.path) {
            return false;
        }

        let from = self.node(&record.path);
        for target in record.resolved_dependencies.values() {
            let to = self.node(target);
            self.graph.update_edge(from, to, ());
        }

        self.modules.insert(record.path.clone(), record);
        true
    }

    fn node(&mut self, path: &ModulePath) -> NodeIndex {
        if let Some(&index) = self.node_indices.get(path) {
            return index;
        }
        let index = self.graph.add_node(path.clone());
        self.node_indices.insert(path.clone(), index);
        index
    }

    /// Check that the entry and every resolved dependency are keys of the graph
    pub fn verify_closure(&self) -> Result<()> {
        if !self.contains(&self.entry) {
            return Err(BundleError::GraphIntegrity {
                importer: "<entry>".to_owned(),
                specifier: self.entry.to_string(),
                path: self.entry.to_string(),
            });
        }

        for record in self.modules.values() {
            for (specifier, target) in &record.resolved_dependencies {
                if !self.contains(target) {
                    return Err(BundleError::GraphIntegrity {
                        importer: record.path.to_string(),
                        specifier: specifier.clone(),
                        path: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Groups of modules that import each other, directly or transitively
    pub fn cycles(&self) -> Vec<Vec<ModulePath>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| self.graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut paths: Vec<ModulePath> = component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect();
                paths.sort();
                paths
            })
            .collect()
    }
}
