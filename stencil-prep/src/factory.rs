//! Template preparation pipeline
//!
//! [`TemplateFactory`] resolves a template's format, runs the parsing
//! backend and wraps the result in a [`PreparedTemplate`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::markup::MarkupBackend;
use crate::backend::{ParseResult, ParsingBackend};
use crate::config::Config;
use crate::error::{ParsingError, PrepareError, WRAPPED_FAILURE_MESSAGE};
use crate::formats::{DocumentFormat, FormatRegistry};
use crate::scratch;
use crate::template::PreparedTemplate;
use crate::variables::TemplateVariables;

/// Prepares template files with a parsing backend
#[derive(Clone)]
pub struct TemplateFactory {
    backend: Arc<dyn ParsingBackend>,
    registry: FormatRegistry,
}

impl TemplateFactory {
    /// Create a factory using the default extension table
    pub fn new(backend: impl ParsingBackend + 'static) -> Self {
        Self::with_registry(backend, FormatRegistry::default())
    }

    pub fn with_registry(backend: impl ParsingBackend + 'static, registry: FormatRegistry) -> Self {
        Self {
            backend: Arc::new(backend),
            registry,
        }
    }

    /// Factory with the markup backend and the configured format aliases
    pub fn from_config(config: &Config) -> Self {
        Self::with_registry(
            MarkupBackend::from_config(&config.markup),
            config.formats.registry(),
        )
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Format of the file at `path`, judged by its file name
    pub fn resolve(&self, path: &Path) -> Result<DocumentFormat, PrepareError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.registry
            .resolve(&file_name)
            .ok_or(PrepareError::UnsupportedFormat { file_name })
    }

    /// Prepare a template file, detecting its format from the file name.
    ///
    /// Unsupported extensions fail before the file is opened.
    pub fn prepare_file(&self, path: &Path) -> Result<PreparedTemplate, PrepareError> {
        let format = self.resolve(path)?;
        let file = File::open(path).map_err(|source| PrepareError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        self.prepare(format, &mut reader, path.to_path_buf())
    }

    /// Run the backend on `input` and build the prepared handle.
    ///
    /// Structured [`ParsingError`]s from the backend are returned as they
    /// are; any other failure is wrapped into one.
    pub fn prepare(
        &self,
        format: DocumentFormat,
        input: &mut dyn Read,
        source: PathBuf,
    ) -> Result<PreparedTemplate, PrepareError> {
        let parsed = self.invoke_backend(format, input, &source)?;
        let variables = variable_names(&parsed);

        if let Some(dir) = parsed.scratch_dir() {
            scratch::register(dir);
        }

        tracing::debug!(
            %format,
            source = %source.display(),
            variables = variables.len(),
            "prepared template"
        );

        Ok(PreparedTemplate::new(source, format, parsed, variables))
    }

    fn invoke_backend(
        &self,
        format: DocumentFormat,
        input: &mut dyn Read,
        source: &Path,
    ) -> Result<ParseResult, ParsingError> {
        self.backend.parse(format, input).map_err(|err| {
            match err.downcast::<ParsingError>() {
                Ok(parsing) => parsing,
                Err(other) => {
                    tracing::warn!(
                        "Backend failed on {} ({}): {:#}",
                        source.display(),
                        format,
                        other
                    );
                    ParsingError::wrapping(WRAPPED_FAILURE_MESSAGE, other)
                }
            }
        })
    }
}

impl std::fmt::Debug for TemplateFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateFactory")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Variable set from the parse result; empty when the backend listed none
fn variable_names(parsed: &ParseResult) -> TemplateVariables {
    match &parsed.variables {
        Some(paths) => TemplateVariables::from_paths(paths.iter().map(String::as_str)),
        None => TemplateVariables::empty(),
    }
}
