//! Prepared template handle
//!
//! A [`PreparedTemplate`] wraps the backend's parse result together with the
//! template's identity and variables. It is valid until released; releasing
//! deletes the scratch directory the backend left behind, exactly once, no
//! matter how many threads call [`release`](PreparedTemplate::release).
//! Dropping the handle releases it as well.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};

use crate::backend::ParseResult;
use crate::error::PrepareError;
use crate::formats::DocumentFormat;
use crate::scratch;
use crate::variables::TemplateVariables;

/// A parsed template, ready to be handed to a renderer.
#[derive(Debug)]
pub struct PreparedTemplate {
    source: PathBuf,
    format: DocumentFormat,
    created_at: DateTime<Local>,
    parsed: ParseResult,
    variables: TemplateVariables,
    scratch_dir: Option<PathBuf>,
    valid: AtomicBool,
}

impl PreparedTemplate {
    /// Wrap a parse result. The handle takes ownership of its scratch directory.
    pub(crate) fn new(
        source: PathBuf,
        format: DocumentFormat,
        parsed: ParseResult,
        variables: TemplateVariables,
    ) -> Self {
        let scratch_dir = parsed.scratch_dir.clone();
        Self {
            source,
            format,
            created_at: Local::now(),
            parsed,
            variables,
            scratch_dir,
            valid: AtomicBool::new(true),
        }
    }

    /// The template file this handle was prepared from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// When preparation finished
    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn variables(&self) -> &TemplateVariables {
        &self.variables
    }

    /// Scratch directory owned by this handle, if the backend created one
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// The backend's parse result.
    ///
    /// Fails with [`PrepareError::Released`] once the handle has been released.
    pub fn parse_result(&self) -> Result<&ParseResult, PrepareError> {
        if self.is_valid() {
            Ok(&self.parsed)
        } else {
            Err(PrepareError::Released)
        }
    }

    /// Invalidate the handle and delete its scratch directory.
    ///
    /// Only the first call does anything; it returns `true`. Every later or
    /// concurrent call returns `false`.
    pub fn release(&self) -> bool {
        if self
            .valid
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(dir) = &self.scratch_dir {
            match scratch::force_delete(dir) {
                Ok(()) => {
                    scratch::unregister(dir);
                }
                // Still registered, so the exit purge gets another try
                Err(e) => tracing::warn!(
                    "Failed to delete scratch directory {}: {}",
                    dir.display(),
                    e
                ),
            }
        }

        tracing::debug!(source = %self.source.display(), "released template");
        true
    }
}

impl Drop for PreparedTemplate {
    fn drop(&mut self) {
        self.release();
    }
}
