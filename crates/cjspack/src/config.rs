//! Configuration loading
//!
//! Sources, lowest priority first: built-in defaults, the user config file,
//! `cjspack.toml` in the project directory, then `CJSPACK_ENTRY` and
//! `CJSPACK_OUTPUT` from the environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use etcetera::{BaseStrategy, choose_base_strategy};
use log::debug;
use serde::Deserialize;

use crate::error::{BundleError, Result};

pub const CONFIG_FILE_NAME: &str = "cjspack.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Entry file, relative to the project directory
    pub entry: PathBuf,
    /// Artifact destination, relative to the project directory
    pub output: PathBuf,
    /// Probed in order when a specifier does not name a file as written
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("./index.js"),
            output: PathBuf::from("./dist/bundle.js"),
            extensions: vec![".js".to_owned(), ".mjs".to_owned(), ".cjs".to_owned()],
        }
    }
}

/// On-disk form; every key is optional so files can be layered
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    entry: Option<PathBuf>,
    output: Option<PathBuf>,
    extensions: Option<Vec<String>>,
}

impl Config {
    /// Load the layered configuration for a project.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Some(user_dir) = user_config_dir() {
            config.merge_file(&user_dir.join(CONFIG_FILE_NAME))?;
        }
        config.merge_file(&project_dir.join(CONFIG_FILE_NAME))?;
        config.apply_overrides(
            env::var_os("CJSPACK_ENTRY").map(PathBuf::from),
            env::var_os("CJSPACK_OUTPUT").map(PathBuf::from),
        );
        Ok(config)
    }

    /// Apply a config file on top of the current values. A missing file is
    /// not an error.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Ok(());
        }
        debug!("Loading configuration from {}", path.display());

        let text = fs::read_to_string(path).map_err(|source| BundleError::io(path, source))?;
        let file: ConfigFile = toml::from_str(&text).map_err(|err| BundleError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        if let Some(entry) = file.entry {
            self.entry = entry;
        }
        if let Some(output) = file.output {
            self.output = output;
        }
        if let Some(extensions) = file.extensions {
            self.extensions = extensions;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, entry: Option<PathBuf>, output: Option<PathBuf>) {
        if let Some(entry) = entry {
            debug!("Entry overridden to {}", entry.display());
            self.entry = entry;
        }
        if let Some(output) = output {
            debug!("Output overridden to {}", output.display());
            self.output = output;
        }
    }
}

/// Directory holding the user-level config file, respecting
/// `CJSPACK_CONFIG_DIR` and then the platform's config location.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Some(custom) = env::var_os("CJSPACK_CONFIG_DIR") {
        return Some(PathBuf::from(custom));
    }
    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("cjspack"))
}
