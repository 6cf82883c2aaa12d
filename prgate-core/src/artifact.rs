//! Loading of optional CI artifacts.

use std::path::Path;

use log::{info, warn};

use crate::error::PrGateError;
use crate::fs::FileSystem;

/// Outcome of loading and parsing an optional artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact<T> {
    /// The artifact was found and parsed.
    Present(T),
    /// The artifact was not found or could not be read.
    Absent,
    /// The artifact was read but could not be parsed.
    Malformed(String),
}

impl<T> Artifact<T> {
    /// Return the parsed value, if present.
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Malformed(_) => None,
        }
    }

}

/// Read an artifact and parse it, classifying the result.
///
/// Read failures of any kind yield [`Artifact::Absent`]; parse failures yield
/// [`Artifact::Malformed`] with the parser's message.
pub fn load<F, T, P>(fs: &F, path: &Path, parse: P) -> Artifact<T>
where
    F: FileSystem + ?Sized,
    P: FnOnce(&str) -> Result<T, PrGateError>,
{
    let contents = match fs.read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            info!("artifact {} not available: {err}", path.display());
            return Artifact::Absent;
        }
    };
    match parse(&contents) {
        Ok(value) => Artifact::Present(value),
        Err(err) => {
            warn!("artifact {} is malformed: {err}", path.display());
            Artifact::Malformed(err.to_string())
        }
    }
}
