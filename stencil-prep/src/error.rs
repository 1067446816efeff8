//! Error types for template preparation

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Message used when a backend failure has to be wrapped
pub const WRAPPED_FAILURE_MESSAGE: &str = "could not parse template file";

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A structured template parsing failure.
///
/// Backends return this directly for failures they understand; the
/// preparation pipeline wraps every other backend error into one, keeping
/// the original error as [`source`](StdError::source).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParsingError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ParsingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Build a parsing error that keeps `cause` as its source.
    pub fn wrapping(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error wraps an underlying failure
    pub fn is_wrapped(&self) -> bool {
        self.source.is_some()
    }
}

/// Errors surfaced by the preparation entry points and the prepared handle
#[derive(Debug, Error)]
pub enum PrepareError {
    /// The file extension matches no registered document format
    #[error("unsupported template file type: {file_name}")]
    UnsupportedFormat { file_name: String },

    /// The parsing backend failed
    #[error(transparent)]
    Parsing(#[from] ParsingError),

    /// The parse result was requested after the template was released
    #[error("cannot use a released template")]
    Released,

    /// The template file could not be opened or read
    #[error("failed to read template file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PrepareError {
    /// The inner parsing error, if this is a parsing failure
    pub fn as_parsing(&self) -> Option<&ParsingError> {
        match self {
            PrepareError::Parsing(err) => Some(err),
            _ => None,
        }
    }
}
