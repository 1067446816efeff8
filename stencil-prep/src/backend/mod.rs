//! Parsing backends (the per-format document parsers)

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::formats::DocumentFormat;

pub mod markup;

/// Structured output of a parsing backend.
///
/// Only [`variables`](Self::variables) and [`scratch_dir`](Self::scratch_dir)
/// are interpreted during preparation. Everything else lives in the payload
/// and is handed to the renderer unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ParseResult {
    /// Variable paths found in the document; `None` means no variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    /// Transient directory the backend created while parsing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Opaque data for the renderer
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Look up a payload entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Trait for turning raw template bytes into a [`ParseResult`].
///
/// Implementations may return a [`ParsingError`](crate::error::ParsingError)
/// (passed through unchanged) or any other error (wrapped by the pipeline).
pub trait ParsingBackend: Send + Sync {
    /// Parse the template stream of the given format
    fn parse(&self, format: DocumentFormat, input: &mut dyn Read) -> anyhow::Result<ParseResult>;
}

impl<T: ParsingBackend + ?Sized> ParsingBackend for Arc<T> {
    fn parse(&self, format: DocumentFormat, input: &mut dyn Read) -> anyhow::Result<ParseResult> {
        (**self).parse(format, input)
    }
}
