//! Depth-first discovery of every module reachable from the entry file
//!
//! The builder owns no state between builds: each call to [`GraphBuilder::build`]
//! creates a fresh [`ModuleGraph`] and threads it through the traversal.
//! A record is inserted before its dependencies are visited, so a path that
//! loops back to a module in progress finds it already present.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, trace, warn};
use sha2::{Digest, Sha256};

use crate::{
    analyzer::SourceAnalyzer,
    error::{BundleError, Result},
    module_graph::{ModuleGraph, ModuleRecord},
    resolver::PathResolver,
    types::{FxIndexMap, ModulePath},
};

pub struct GraphBuilder<'a> {
    resolver: &'a PathResolver,
    analyzer: &'a dyn SourceAnalyzer,
}

impl std::fmt::Debug for GraphBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a PathResolver, analyzer: &'a dyn SourceAnalyzer) -> Self {
        Self { resolver, analyzer }
    }

    /// Build the module graph for `entry`.
    ///
    /// Any resolution, analysis or read failure aborts the build; no partial
    /// graph is returned.
    pub fn build(&self, entry: &Path) -> Result<ModuleGraph> {
        let entry_file = self.resolver.resolve_entry(entry)?;
        let entry_path = self.resolver.module_path(&entry_file)?;
        debug!("Building module graph from {entry_path}");

        let mut graph = ModuleGraph::new(entry_path);

        // Pending files, popped in depth-first, specifier order
        let mut stack: Vec<PathBuf> = vec![entry_file];
        while let Some(file) = stack.pop() {
            let dependencies = self.process(&file, &mut graph)?;
            stack.extend(dependencies.into_iter().rev());
        }

        graph.verify_closure()?;
        for cycle in graph.cycles() {
            let members: Vec<&str> = cycle.iter().map(ModulePath::as_str).collect();
            warn!(
                "Import cycle between {}; modules in the cycle may observe partially \
                 initialized exports",
                members.join(", ")
            );
        }

        info!("Module graph complete: {} module(s)", graph.len());
        Ok(graph)
    }

    /// Analyze one file and insert its record. Returns the resolved files of
    /// its dependencies, or nothing if the file was already in the graph.
    fn process(&self, file: &Path, graph: &mut ModuleGraph) -> Result<Vec<PathBuf>> {
        let path = self.resolver.module_path(file)?;
        if graph.contains(&path) {
            trace!("Module {path} already visited");
            return Ok(Vec::new());
        }

        let source = fs::read_to_string(file).map_err(|source| BundleError::io(file, source))?;
        let content_hash = format!("{:x}", Sha256::digest(source.as_bytes()));
        let analysis = self.analyzer.analyze(&source, file)?;

        let mut resolved_files = Vec::with_capacity(analysis.dependency_specifiers.len());
        let mut resolved_dependencies = FxIndexMap::default();
        for specifier in &analysis.dependency_specifiers {
            let dependency = self.resolver.resolve(specifier, file)?;
            resolved_dependencies.insert(specifier.clone(), self.resolver.module_path(&dependency)?);
            resolved_files.push(dependency);
        }

        debug!(
            "Discovered {path} ({}, {} dependencies)",
            &content_hash[..12],
            resolved_files.len()
        );

        graph.insert(ModuleRecord {
            path,
            file: file.to_path_buf(),
            dependency_specifiers: analysis.dependency_specifiers,
            resolved_dependencies,
            body: analysis.body,
            content_hash,
        });

        Ok(resolved_files)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashMap;
    use tempfile::TempDir;

    use super::*;
    use crate::analyzer::{Analysis, EsmAnalyzer};

    fn create_test_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn extensions() -> Vec<String> {
        vec![".js".to_owned()]
    }

    /// Counts how often each file is analyzed
    #[derive(Default)]
    struct CountingAnalyzer {
        inner: EsmAnalyzer,
        calls: RefCell<FxHashMap<PathBuf, usize>>,
    }

    impl SourceAnalyzer for CountingAnalyzer {
        fn analyze(&self, source: &str, path: &Path) -> Result<Analysis> {
            *self
                .calls
                .borrow_mut()
                .entry(path.to_path_buf())
                .or_default() += 1;
            self.inner.analyze(source, path)
        }
    }

    fn keys(graph: &ModuleGraph) -> Vec<&str> {
        graph.modules().map(|record| record.path.as_str()).collect()
    }

    #[test]
    fn test_diamond_dependency_is_analyzed_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(
            &root.join("index.js"),
            "import a from './a.js';\nimport b from './b.js';\n",
        );
        create_test_file(&root.join("a.js"), "import c from './shared/c.js';\nexport default c;\n");
        create_test_file(&root.join("b.js"), "import c from './shared/c.js';\nexport default c;\n");
        create_test_file(&root.join("shared/c.js"), "export default 3;\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = CountingAnalyzer::default();
        let graph = GraphBuilder::new(&resolver, &analyzer)
            .build(&root.join("index.js"))
            .unwrap();

        assert_eq!(keys(&graph), vec!["./index.js", "./a.js", "./shared/c.js", "./b.js"]);
        let calls = analyzer.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert!(calls.values().all(|&count| count == 1));
    }

    #[test]
    fn test_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(&root.join("index.js"), "import './a.js';\n");
        create_test_file(&root.join("a.js"), "import './b.js';\nexport const a = 1;\n");
        create_test_file(&root.join("b.js"), "import './a.js';\nexport const b = 2;\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = EsmAnalyzer::new();
        let graph = GraphBuilder::new(&resolver, &analyzer)
            .build(&root.join("index.js"))
            .unwrap();

        assert_eq!(keys(&graph), vec!["./index.js", "./a.js", "./b.js"]);
        assert_eq!(graph.cycles().len(), 1);
    }

    #[test]
    fn test_closure_and_specifiers() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(
            &root.join("index.js"),
            "import { add } from './math/add';\nconsole.log(add(1, 2));\n",
        );
        create_test_file(
            &root.join("math/add.js"),
            "import { check } from '../util.js';\nexport function add(a, b) { return check(a) + \
             b; }\n",
        );
        create_test_file(&root.join("util.js"), "export const check = (x) => x;\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = EsmAnalyzer::new();
        let graph = GraphBuilder::new(&resolver, &analyzer)
            .build(&root.join("index.js"))
            .unwrap();

        assert_eq!(graph.entry().as_str(), "./index.js");
        for record in graph.modules() {
            for target in record.resolved_dependencies.values() {
                assert!(graph.contains(target), "{target} missing from graph");
            }
        }

        let add = graph.get(&ModulePath::from("./math/add.js")).unwrap();
        assert_eq!(add.dependency_specifiers, vec!["../util.js"]);
        assert_eq!(
            add.resolved_dependencies.get("../util.js"),
            Some(&ModulePath::from("./util.js"))
        );
    }

    #[test]
    fn test_missing_dependency_aborts_build() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(&root.join("index.js"), "import x from './missing.js';\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = EsmAnalyzer::new();
        let err = GraphBuilder::new(&resolver, &analyzer)
            .build(&root.join("index.js"))
            .unwrap_err();

        match err {
            BundleError::Resolution {
                specifier,
                importer,
            } => {
                assert_eq!(specifier, "./missing.js");
                assert_eq!(importer, root.join("index.js").canonicalize().unwrap());
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
    }

    #[test]
    fn test_analysis_error_aborts_build() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(&root.join("index.js"), "import './bad.js';\n");
        create_test_file(&root.join("bad.js"), "export const = ;\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = EsmAnalyzer::new();
        let err = GraphBuilder::new(&resolver, &analyzer)
            .build(&root.join("index.js"))
            .unwrap_err();

        match err {
            BundleError::Analysis { path, .. } => {
                assert_eq!(path, root.join("bad.js").canonicalize().unwrap());
            }
            other => panic!("expected analysis error, got {other:?}"),
        }
    }

    #[test]
    fn test_builds_are_deterministic() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        create_test_file(
            &root.join("index.js"),
            "import './b.js';\nimport './a.js';\nimport './b.js';\n",
        );
        create_test_file(&root.join("a.js"), "export default 'a';\n");
        create_test_file(&root.join("b.js"), "export default 'b';\n");

        let resolver = PathResolver::new(root, extensions()).unwrap();
        let analyzer = EsmAnalyzer::new();
        let builder = GraphBuilder::new(&resolver, &analyzer);
        let first = builder.build(&root.join("index.js")).unwrap();
        let second = builder.build(&root.join("index.js")).unwrap();

        assert_eq!(keys(&first), keys(&second));
        for (a, b) in first.modules().zip(second.modules()) {
            assert_eq!(a, b);
        }
        let index = first.get(&ModulePath::from("./index.js")).unwrap();
        assert_eq!(
            index.dependency_specifiers,
            vec!["./b.js", "./a.js", "./b.js"]
        );
    }
}
