//! Source analysis contract
//!
//! The graph builder does not parse JavaScript itself. It hands each file to a
//! [`SourceAnalyzer`], which reports the file's dependency specifiers and a
//! transformed body that refers to `require`, `module` and `exports` as free
//! variables. The emitter later wraps that body in a module factory.

mod esm;

use std::path::Path;

pub use esm::EsmAnalyzer;

use crate::error::Result;

/// Result of analyzing one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Specifiers in the order they appear in source
    pub dependency_specifiers: Vec<String>,
    /// Module code rewritten to the `require`/`module`/`exports` convention
    pub body: String,
}

pub trait SourceAnalyzer {
    /// Analyze `source`, read from `path`.
    ///
    /// A file that cannot be parsed or transformed must produce
    /// [`BundleError::Analysis`](crate::error::BundleError::Analysis) naming `path`.
    fn analyze(&self, source: &str, path: &Path) -> Result<Analysis>;
}

impl<T: SourceAnalyzer + ?Sized> SourceAnalyzer for &T {
    fn analyze(&self, source: &str, path: &Path) -> Result<Analysis> {
        (**self).analyze(source, path)
    }
}

impl<T: SourceAnalyzer + ?Sized> SourceAnalyzer for Box<T> {
    fn analyze(&self, source: &str, path: &Path) -> Result<Analysis> {
        (**self).analyze(source, path)
    }
}
