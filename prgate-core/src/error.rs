//! Error types for prgate core.

use std::{error::Error, fmt, io};

/// Error type for prgate core operations.
#[derive(Debug)]
pub enum PrGateError {
    /// An underlying I/O error.
    Io(io::Error),
    /// A structured JSON artifact could not be decoded.
    Json(serde_json::Error),
    /// A structured XML artifact could not be decoded.
    Xml(String),
    /// Neither the baseline nor the candidate run produced any test results.
    NoTestData,
    /// A report section could not be rendered.
    Render(String),
    /// The tracking system rejected or failed a request.
    Tracker(String),
    /// Required configuration is missing or invalid.
    Config(String),
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for PrGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Xml(message) => write!(f, "xml error: {message}"),
            Self::NoTestData => write!(f, "no unit test results found"),
            Self::Render(message) => write!(f, "render error: {message}"),
            Self::Tracker(message) => write!(f, "tracker error: {message}"),
            Self::Config(message) => write!(f, "config error: {message}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for PrGateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PrGateError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PrGateError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience result type for prgate core.
pub type Result<T> = std::result::Result<T, PrGateError>;

#[cfg(test)]
mod tests {
    use super::PrGateError;
    use std::io;

    #[test]
    fn io_error_formats_message() {
        let error = PrGateError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(format!("{error}"), "io error: boom");
    }

    #[test]
    fn no_test_data_formats_message() {
        assert_eq!(
            PrGateError::NoTestData.to_string(),
            "no unit test results found"
        );
    }

    #[test]
    fn from_io_error_maps_variant() {
        let error: PrGateError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        match error {
            PrGateError::Io(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn from_json_error_maps_variant() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: PrGateError = err.into();
        assert!(matches!(error, PrGateError::Json(_)));
        assert!(error.to_string().starts_with("json error:"));
    }
}
