//! stencil-prep - template preparation for document rendering
//!
//! This crate turns raw template documents (docx, xlsx, odt, xml, ...) into
//! [`PreparedTemplate`] handles: it detects the document format, runs a
//! parsing backend, collects the variables the template uses and owns any
//! scratch files the backend created until the handle is released.
//!
//! # Example
//!
//! ```rust
//! use stencil_prep::{DocumentFormat, MarkupBackend, TemplateFactory};
//!
//! let factory = TemplateFactory::new(MarkupBackend::new());
//! let mut input: &[u8] = b"Dear {%= client.name %}";
//! let template = factory
//!     .prepare(DocumentFormat::Txt, &mut input, "letter.txt".into())
//!     .unwrap();
//!
//! assert!(template.variables().contains("client.name"));
//! template.release();
//! assert!(template.parse_result().is_err());
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod formats;
pub mod reports;
pub mod scratch;
pub mod template;
pub mod variables;

pub use backend::markup::MarkupBackend;
pub use backend::{ParseResult, ParsingBackend};
pub use cache::TemplateCache;
pub use config::Config;
pub use error::{ParsingError, PrepareError};
pub use factory::TemplateFactory;
pub use formats::{DocumentFormat, FormatRegistry};
pub use template::PreparedTemplate;
pub use variables::{TemplateVariables, VariablePath};
