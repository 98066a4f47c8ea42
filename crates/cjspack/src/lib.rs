//! cjspack bundles an ES module graph into one standalone script.
//!
//! Starting from an entry file, [`graph_builder::GraphBuilder`] resolves and
//! analyzes every reachable file exactly once. [`emitter::emit`] then writes
//! the graph out as a module table wrapped in a small CommonJS-style loader.

pub mod analyzer;
pub mod bundle_plan;
pub mod config;
pub mod emitter;
pub mod error;
pub mod graph_builder;
pub mod module_graph;
pub mod orchestrator;
pub mod resolver;
pub mod types;
pub mod writer;

pub use error::{BundleError, Result};
