//! PDF extraction via pdfium: one unit per page.
//!
//! ## Why pdfium?
//!
//! pdfium is the text layer Chrome uses. It copes with the broken xref tables,
//! odd font encodings and incremental updates that lecture slides exported
//! from a dozen different tools routinely contain, where pure-Rust parsers give
//! up or return mojibake.
//!
//! Pages without a text layer (scans, photos of a whiteboard) come back empty
//! and are recorded in [`Document::skipped_units`]; OCR is out of scope.

use crate::document::Document;
use crate::error::StudyError;
use crate::format::DocumentFormat;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment variable pointing at a pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Extract the text layer of every page.
pub fn extract_pdf(bytes: &[u8]) -> Result<Document, StudyError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            StudyError::PasswordRequired
        } else {
            StudyError::CorruptDocument {
                format: DocumentFormat::Pdf,
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: text layer unreadable: {:?}", idx + 1, e);
                String::new()
            }
        };
        debug!("Page {}: {} chars", idx + 1, text.len());
        texts.push(text);
    }

    Ok(Document::from_units(texts))
}

/// Bind to a pdfium library.
///
/// Resolution order, first success wins:
/// 1. `PDFIUM_LIB_PATH` — a library file, or a directory containing one
/// 2. the current working directory
/// 3. the system library search path
pub fn bind_pdfium() -> Result<Pdfium, StudyError> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in library_candidates() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            attempts.push(format!("system library: {:?}", e));
            StudyError::PdfiumBindingFailed(attempts.join("; "))
        })
}

/// Explicit library paths to try before the system search path.
fn library_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(raw) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !raw.is_empty() {
            let path = PathBuf::from(&raw);
            if path.is_dir() {
                candidates.push(Pdfium::pdfium_platform_library_name_at_path(&raw));
            } else {
                candidates.push(path);
            }
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    if local.exists() {
        candidates.push(local);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_honour_env_file_path() {
        // A file path that does not exist is still tried verbatim.
        std::env::set_var(PDFIUM_LIB_PATH_ENV, "/opt/pdfium/lib/libpdfium-test.so");
        let candidates = library_candidates();
        std::env::remove_var(PDFIUM_LIB_PATH_ENV);
        assert_eq!(
            candidates.first(),
            Some(&PathBuf::from("/opt/pdfium/lib/libpdfium-test.so"))
        );
    }
}
