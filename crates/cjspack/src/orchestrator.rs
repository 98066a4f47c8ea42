//! Drives one build: resolve the entry, build the graph, emit, write.

use std::path::{Path, PathBuf};

use log::info;

use crate::{
    analyzer::{EsmAnalyzer, SourceAnalyzer},
    config::Config,
    emitter,
    error::Result,
    graph_builder::GraphBuilder,
    resolver::PathResolver,
    writer::OutputWriter,
};

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub modules: usize,
    pub bytes: usize,
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct BundleOrchestrator<A = EsmAnalyzer> {
    project_dir: PathBuf,
    config: Config,
    analyzer: A,
}

impl BundleOrchestrator {
    pub fn new(project_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self::with_analyzer(project_dir, config, EsmAnalyzer::new())
    }
}

impl<A: SourceAnalyzer> BundleOrchestrator<A> {
    pub fn with_analyzer(project_dir: impl Into<PathBuf>, config: Config, analyzer: A) -> Self {
        Self {
            project_dir: project_dir.into(),
            config,
            analyzer,
        }
    }

    pub fn entry_path(&self) -> PathBuf {
        self.project_dir.join(&self.config.entry)
    }

    pub fn output_path(&self) -> PathBuf {
        self.project_dir.join(&self.config.output)
    }

    /// Build and emit the artifact without writing it anywhere.
    pub fn bundle(&self) -> Result<String> {
        self.bundle_entry(&self.entry_path()).map(|(artifact, _)| artifact)
    }

    /// Build, emit and hand the artifact to `writer`. The writer is only
    /// called once the whole artifact exists.
    pub fn bundle_to(&self, writer: &dyn OutputWriter) -> Result<BundleSummary> {
        let (artifact, modules) = self.bundle_entry(&self.entry_path())?;
        let output = self.output_path();
        writer.write(&output, &artifact)?;
        info!("Wrote {}", output.display());
        Ok(BundleSummary {
            modules,
            bytes: artifact.len(),
            output,
        })
    }

    fn bundle_entry(&self, entry: &Path) -> Result<(String, usize)> {
        let resolver = PathResolver::for_entry(entry, self.config.extensions.clone())?;
        let graph = GraphBuilder::new(&resolver, &self.analyzer).build(entry)?;
        let artifact = emitter::emit(&graph)?;
        Ok((artifact, graph.len()))
    }
}
