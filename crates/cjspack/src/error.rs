//! Error taxonomy for a bundling run
//!
//! Every variant is fatal: the build stops at the first error and no artifact
//! is produced. Variants carry enough context (file path, specifier) to point
//! at the offending import statement.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BundleError {
    /// A specifier did not map to an existing file
    #[error("cannot resolve '{specifier}' imported from {}", importer.display())]
    Resolution {
        specifier: String,
        importer: PathBuf,
    },

    /// The analyzer could not parse or transform a file
    #[error("failed to analyze {}: {message}", path.display())]
    Analysis { path: PathBuf, message: String },

    /// Reading a source file or writing the artifact failed
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dependency edge points at a module missing from the graph.
    /// This indicates a defect in the graph builder, not in user input.
    #[error(
        "module graph is not closed: '{specifier}' in {importer} resolves to {path}, which is \
         not part of the graph"
    )]
    GraphIntegrity {
        importer: String,
        specifier: String,
        path: String,
    },

    /// A configuration file could not be read or contained invalid keys
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl BundleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn analysis(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Analysis {
            path: path.into(),
            message: message.into(),
        }
    }
}
