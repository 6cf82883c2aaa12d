//! Filesystem abstractions used for artifact loading.

use std::path::{Path, PathBuf};

use crate::error::{PrGateError, Result};

/// Abstraction over filesystem access for testability.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// List files under `root` matching a glob `pattern`, sorted by path.
    fn find_files(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>>;
    /// Read a file into a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Default filesystem implementation backed by `std::fs` and `glob`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Create a new standard filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFileSystem {
    fn find_files(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let full = root.join(pattern);
        let full = full
            .to_str()
            .ok_or_else(|| PrGateError::Other(format!("non-utf8 path: {}", full.display())))?;
        let paths = glob::glob(full)
            .map_err(|err| PrGateError::Other(format!("invalid pattern {full}: {err}")))?;

        let mut files = Vec::new();
        for entry in paths {
            let path = entry.map_err(|err| PrGateError::Io(err.into_error()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}
