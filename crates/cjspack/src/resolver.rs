use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    error::{BundleError, Result},
    types::ModulePath,
};

/// Maps import specifiers to files on disk
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Canonical project root; graph keys are relative to it
    root: PathBuf,
    /// Extensions probed when the specifier does not name a file as written
    extensions: Vec<String>,
}

impl PathResolver {
    /// Create a resolver rooted at `root`, which must be an existing directory.
    pub fn new(root: &Path, extensions: Vec<String>) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|source| BundleError::io(root, source))?;
        debug!("Resolver root set to {}", root.display());
        Ok(Self { root, extensions })
    }

    /// Create a resolver rooted at the directory containing `entry`. The
    /// entry itself need not exist yet; that is reported by `resolve_entry`.
    pub fn for_entry(entry: &Path, extensions: Vec<String>) -> Result<Self> {
        let root = match entry.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::new(root, extensions)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the entry file itself, relative to the working directory.
    /// The project root stands in as the importer in error reports.
    pub fn resolve_entry(&self, entry: &Path) -> Result<PathBuf> {
        let spec = entry.to_string_lossy();
        let unresolved = || BundleError::Resolution {
            specifier: spec.to_string(),
            importer: self.root.clone(),
        };
        let resolved = self.probe(Path::new(""), &spec).ok_or_else(unresolved)?;
        self.module_path(&resolved).map_err(|_| unresolved())?;
        Ok(resolved)
    }

    /// Resolve `specifier` as written in `importer`.
    ///
    /// Relative specifiers are joined to the importer's directory. The result
    /// is the canonical absolute path of an existing file.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        let unresolved = || BundleError::Resolution {
            specifier: specifier.to_owned(),
            importer: importer.to_path_buf(),
        };

        if !is_path_specifier(specifier) {
            debug!(
                "Refusing bare specifier '{specifier}' in {}",
                importer.display()
            );
            return Err(unresolved());
        }

        let importer_dir = importer.parent().unwrap_or(&self.root);
        let resolved = self.probe(importer_dir, specifier).ok_or_else(unresolved)?;
        // A file whose name cannot be keyed losslessly is treated as unresolvable
        self.module_path(&resolved).map_err(|_| unresolved())?;
        trace!(
            "Resolved '{specifier}' from {} to {}",
            importer.display(),
            resolved.display()
        );
        Ok(resolved)
    }

    /// Graph key for a canonical file path. Fails for paths that are not
    /// valid UTF-8 below the root.
    pub fn module_path(&self, canonical: &Path) -> Result<ModulePath> {
        ModulePath::relative_to(&self.root, canonical).ok_or_else(|| BundleError::Resolution {
            specifier: canonical.to_string_lossy().into_owned(),
            importer: self.root.clone(),
        })
    }

    /// Try the specifier as written, then with each extension appended, then
    /// as a directory containing an `index` file.
    fn probe(&self, dir: &Path, specifier: &str) -> Option<PathBuf> {
        let base = dir.join(specifier);

        let mut candidates = vec![base.clone()];
        for ext in &self.extensions {
            let mut with_ext = OsString::from(base.as_os_str());
            with_ext.push(ext);
            candidates.push(PathBuf::from(with_ext));
        }
        for ext in &self.extensions {
            candidates.push(base.join(format!("index{ext}")));
        }

        candidates.into_iter().find_map(|candidate| {
            trace!("Probing {}", candidate.display());
            if candidate.is_file() {
                candidate.canonicalize().ok()
            } else {
                None
            }
        })
    }
}

/// Only relative and absolute specifiers name files; anything else is a
/// package name.
pub(crate) fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}
