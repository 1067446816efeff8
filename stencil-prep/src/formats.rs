//! Document format detection
//!
//! This module maps template file names to the document formats the
//! preparation pipeline knows about.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported template document formats.
///
/// Each variant corresponds to one markup type and determines the
/// canonical tag handed to the parsing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Word processing document (.docx)
    Docx,
    /// Presentation (.pptx)
    Pptx,
    /// Spreadsheet (.xlsx)
    Xlsx,
    /// OpenDocument text (.odt)
    Odt,
    /// OpenDocument spreadsheet (.ods)
    Ods,
    /// OpenDocument presentation (.odp)
    Odp,
    /// Plain XML markup (.xml)
    Xml,
    /// Plain text (.txt)
    Txt,
}

impl DocumentFormat {
    /// Every supported format, in declaration order.
    pub const ALL: [DocumentFormat; 8] = [
        DocumentFormat::Docx,
        DocumentFormat::Pptx,
        DocumentFormat::Xlsx,
        DocumentFormat::Odt,
        DocumentFormat::Ods,
        DocumentFormat::Odp,
        DocumentFormat::Xml,
        DocumentFormat::Txt,
    ];

    /// Canonical tag passed to parsing backends.
    pub fn tag(self) -> &'static str {
        match self {
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Pptx => "PPTX",
            DocumentFormat::Xlsx => "XLSX",
            DocumentFormat::Odt => "ODT",
            DocumentFormat::Ods => "ODS",
            DocumentFormat::Odp => "ODP",
            DocumentFormat::Xml => "XML",
            DocumentFormat::Txt => "TXT",
        }
    }

    /// Default file extensions (lowercase, without the dot).
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            DocumentFormat::Docx => &["docx"],
            DocumentFormat::Pptx => &["pptx"],
            DocumentFormat::Xlsx => &["xlsx"],
            DocumentFormat::Odt => &["odt"],
            DocumentFormat::Ods => &["ods"],
            DocumentFormat::Odp => &["odp"],
            DocumentFormat::Xml => &["xml"],
            DocumentFormat::Txt => &["txt"],
        }
    }

    /// Whether documents of this format are zip packages.
    ///
    /// Backends usually unpack these into a scratch directory while parsing.
    pub fn is_archive(self) -> bool {
        !matches!(self, DocumentFormat::Xml | DocumentFormat::Txt)
    }

    /// Detect the format from a file name using the default extension table.
    ///
    /// Returns `None` if the extension is not recognized.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = extension_of(file_name)?;
        Self::from_extension(&ext)
    }

    /// Look up a single extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when a string names no known format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for DocumentFormat {
    type Err = UnknownFormat;

    /// Accepts a canonical tag or an extension, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.tag().eq_ignore_ascii_case(trimmed))
            .or_else(|| Self::from_extension(trimmed))
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Extension table used to resolve file names.
///
/// Starts from the default extensions and can be extended with aliases
/// (e.g. `docm` for [`DocumentFormat::Docx`]). Built once at startup and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    extensions: BTreeMap<String, DocumentFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let extensions = DocumentFormat::ALL
            .into_iter()
            .flat_map(|format| {
                format
                    .extensions()
                    .iter()
                    .map(move |ext| (ext.to_string(), format))
            })
            .collect();
        Self { extensions }
    }
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add extension aliases on top of the defaults.
    ///
    /// Keys are normalized to lowercase with any leading dot removed.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (S, DocumentFormat)>,
        S: AsRef<str>,
    {
        for (ext, format) in aliases {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() {
                self.extensions.insert(ext, format);
            }
        }
        self
    }

    /// Resolve a file name to a format.
    ///
    /// Returns `None` when the extension is missing or not registered.
    pub fn resolve(&self, file_name: &str) -> Option<DocumentFormat> {
        let ext = extension_of(file_name)?;
        self.extensions.get(&ext).copied()
    }

    /// Registered extensions for a format, sorted.
    pub fn extensions_for(&self, format: DocumentFormat) -> Vec<&str> {
        self.extensions
            .iter()
            .filter(|(_, f)| **f == format)
            .map(|(ext, _)| ext.as_str())
            .collect()
    }
}

/// Lowercased extension of the last path component, if any.
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}
