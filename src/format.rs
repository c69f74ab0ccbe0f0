//! Upload format detection.
//!
//! The format is decided by the filename suffix alone, compared
//! case-insensitively. Content sniffing is intentionally absent: a `.pdf`
//! that is really a zip archive fails later, during extraction, with
//! [`StudyError::CorruptDocument`].

use crate::error::StudyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document formats the extractor understands.
///
/// Legacy Office suffixes share the OOXML readers: `.doc` → [`Docx`](Self::Docx),
/// `.ppt` → [`Pptx`](Self::Pptx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
}

/// Suffix table, checked in order.
const SUFFIXES: &[(&str, DocumentFormat)] = &[
    (".pdf", DocumentFormat::Pdf),
    (".docx", DocumentFormat::Docx),
    (".doc", DocumentFormat::Docx),
    (".pptx", DocumentFormat::Pptx),
    (".ppt", DocumentFormat::Pptx),
];

impl DocumentFormat {
    /// Detect the format from an upload filename.
    ///
    /// # Errors
    /// [`StudyError::UnsupportedFormat`] for any other suffix, including a
    /// missing one.
    pub fn from_filename(filename: &str) -> Result<Self, StudyError> {
        let lower = filename.trim().to_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|(_, format)| *format)
            .ok_or_else(|| StudyError::UnsupportedFormat {
                filename: filename.to_string(),
            })
    }

    /// `true` when the format has intrinsic pages or slides.
    pub fn is_paginated(self) -> bool {
        !matches!(self, DocumentFormat::Docx)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Pptx => "PPTX",
        };
        f.write_str(name)
    }
}
