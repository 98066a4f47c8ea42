//! Typed intermediate form of a bundle
//!
//! The plan is an ordered list of module factories plus the entry key. It is
//! built from a closed [`ModuleGraph`] and serialized by the emitter; nothing
//! here produces JavaScript text.

use log::debug;

use crate::{error::Result, module_graph::ModuleGraph, types::ModulePath};

/// One table entry: the module body and how its specifiers map to keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFactory {
    pub path: ModulePath,
    pub body: String,
    /// (specifier, key), in first-occurrence order
    pub dependency_map: Vec<(String, ModulePath)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePlan {
    pub entry: ModulePath,
    /// Factories in graph discovery order
    pub factories: Vec<ModuleFactory>,
}

impl BundlePlan {
    /// Lay out every module of `graph` as a factory.
    ///
    /// Fails with a graph integrity error if the graph is not closed, which
    /// would otherwise surface only when the runtime reaches the missing
    /// `require`.
    pub fn from_graph(graph: &ModuleGraph) -> Result<Self> {
        graph.verify_closure()?;

        let factories: Vec<ModuleFactory> = graph
            .modules()
            .map(|record| ModuleFactory {
                path: record.path.clone(),
                body: record.body.clone(),
                dependency_map: record
                    .resolved_dependencies
                    .iter()
                    .map(|(specifier, key)| (specifier.clone(), key.clone()))
                    .collect(),
            })
            .collect();

        debug!(
            "Bundle plan: {} factories, entry {}",
            factories.len(),
            graph.entry()
        );

        Ok(Self {
            entry: graph.entry().clone(),
            factories,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::BundleError, module_graph::ModuleRecord};

    fn record(path: &str, deps: &[(&str, &str)], body: &str) -> ModuleRecord {
        ModuleRecord {
            path: ModulePath::from(path),
            file: PathBuf::from(path),
            dependency_specifiers: deps.iter().map(|(spec, _)| (*spec).to_owned()).collect(),
            resolved_dependencies: deps
                .iter()
                .map(|(spec, target)| ((*spec).to_owned(), ModulePath::from(*target)))
                .collect(),
            body: body.to_owned(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn test_plan_follows_graph_order() {
        let mut graph = ModuleGraph::new(ModulePath::from("./index.js"));
        graph.insert(record("./index.js", &[("./a", "./a.js")], "require('./a');"));
        graph.insert(record("./a.js", &[], "exports.x = 1;"));

        let plan = BundlePlan::from_graph(&graph).unwrap();
        assert_eq!(plan.entry, ModulePath::from("./index.js"));
        assert_eq!(
            plan.factories,
            vec![
                ModuleFactory {
                    path: ModulePath::from("./index.js"),
                    body: "require('./a');".to_owned(),
                    dependency_map: vec![("./a".to_owned(), ModulePath::from("./a.js"))],
                },
                ModuleFactory {
                    path: ModulePath::from("./a.js"),
                    body: "exports.x = 1;".to_owned(),
                    dependency_map: vec![],
                },
            ]
        );
    }

    #[test]
    fn test_open_graph_is_rejected() {
        let mut graph = ModuleGraph::new(ModulePath::from("./index.js"));
        graph.insert(record("./index.js", &[("./a", "./a.js")], ""));
        assert!(matches!(
            BundlePlan::from_graph(&graph),
            Err(BundleError::GraphIntegrity { .. })
        ));
    }
}
