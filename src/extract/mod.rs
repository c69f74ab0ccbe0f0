//! Text extraction: raw upload bytes → page-tagged [`Document`].
//!
//! One submodule per backend:
//!
//! 1. [`pdf`]  — pdfium, one unit per page
//! 2. [`docx`] — OOXML word processing, one unpaginated segment
//! 3. [`pptx`] — OOXML presentation, one unit per slide
//!
//! Every backend is synchronous and CPU-bound. [`extract`] moves the work onto
//! tokio's blocking pool so request handlers never stall a worker thread
//! while pdfium or the XML reader chews through a large upload.

pub mod docx;
pub mod pdf;
pub mod pptx;
mod xml;

use crate::document::Document;
use crate::error::StudyError;
use crate::format::DocumentFormat;
use tracing::{debug, warn};

/// Extract a document on the blocking pool.
pub async fn extract(bytes: Vec<u8>, format: DocumentFormat) -> Result<Document, StudyError> {
    tokio::task::spawn_blocking(move || extract_blocking(&bytes, format))
        .await
        .map_err(|e| StudyError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking extraction dispatch.
pub fn extract_blocking(bytes: &[u8], format: DocumentFormat) -> Result<Document, StudyError> {
    let doc = match format {
        DocumentFormat::Pdf => pdf::extract_pdf(bytes)?,
        DocumentFormat::Docx => docx::extract_docx(bytes)?,
        DocumentFormat::Pptx => pptx::extract_pptx(bytes)?,
    };

    if !doc.skipped_units.is_empty() {
        warn!(
            "{}: {} unit(s) without extractable text skipped: {:?}",
            format,
            doc.skipped_units.len(),
            doc.skipped_units
        );
    }
    if format.is_paginated() {
        debug!(
            "{}: extracted {} segment(s) from {} unit(s)",
            format,
            doc.segments.len(),
            doc.source_units.unwrap_or(0)
        );
    } else {
        debug!(
            "{}: extracted {} unpaginated segment(s)",
            format,
            doc.segments.len()
        );
    }

    Ok(doc)
}

/// Open an OOXML package, mapping zip errors onto the document's format.
pub(crate) fn open_package(
    bytes: &[u8],
    format: DocumentFormat,
) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, StudyError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| StudyError::CorruptDocument {
        format,
        detail: format!("not an OOXML package: {}", e),
    })
}

/// Read one part of an OOXML package as UTF-8.
pub(crate) fn read_part(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    format: DocumentFormat,
) -> Result<String, StudyError> {
    use std::io::Read;

    let mut part = archive
        .by_name(name)
        .map_err(|e| StudyError::CorruptDocument {
            format,
            detail: format!("missing part '{}': {}", name, e),
        })?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| StudyError::CorruptDocument {
            format,
            detail: format!("unreadable part '{}': {}", name, e),
        })?;
    Ok(xml)
}
