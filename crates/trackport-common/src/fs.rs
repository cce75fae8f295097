//! Filesystem helpers

use crate::error::{CommonError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|e| CommonError::io(path, e))
}

/// Read and deserialize a YAML document from disk
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| CommonError::io(path, e))?;
    serde_yaml::from_str(&content).map_err(|source| CommonError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
