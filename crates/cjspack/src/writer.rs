use std::{fs, path::Path};

use log::debug;

use crate::error::{BundleError, Result};

/// Destination for a finished artifact
pub trait OutputWriter {
    fn write(&self, destination: &Path, content: &str) -> Result<()>;
}

/// Writes to the local filesystem, creating missing parent directories
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl OutputWriter for FsWriter {
    fn write(&self, destination: &Path, content: &str) -> Result<()> {
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|source| BundleError::io(parent, source))?;
        }
        fs::write(destination, content).map_err(|source| BundleError::io(destination, source))
    }
}
