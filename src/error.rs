//! Error types for the edgequake-study library.
//!
//! A single fatal error type, [`StudyError`], covers everything that stops a
//! request from producing a study aid: an unsupported upload, a document that
//! cannot be opened, a model call that failed after all retries, or a process
//! that was started without provider credentials.
//!
//! One failure mode is deliberately *not* an error: a model response that
//! contains no decodable JSON. The parser recovers from it locally by returning
//! the task's empty shape (see [`crate::pipeline::parse`]), and the outcome is
//! reported through [`crate::output::RunStats::parse_outcome`] instead.

use crate::format::DocumentFormat;
use thiserror::Error;

/// Message returned to HTTP clients for an unsupported upload.
///
/// Front-ends match on this exact string, so it must not change.
pub const UNSUPPORTED_FORMAT_MESSAGE: &str = "Format de fichier non supporté";

/// All fatal errors returned by the edgequake-study library.
#[derive(Debug, Error)]
pub enum StudyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The filename does not end with a supported extension.
    #[error("Unsupported file '{filename}': expected .pdf, .docx, .doc, .pptx or .ppt")]
    UnsupportedFormat { filename: String },

    /// The document could not be opened or parsed.
    #[error("{format} document is corrupt or unreadable: {detail}")]
    CorruptDocument {
        format: DocumentFormat,
        detail: String,
    },

    /// PDF requires a password; uploads never carry one.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// Extraction produced no text and the config asked to reject such documents.
    #[error("No extractable text found in '{filename}' (scanned or image-only document?)")]
    EmptyDocument { filename: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed after all retries (transient) or immediately (fatal).
    #[error("LLM call failed after {attempts} attempt(s): {detail}")]
    ModelCallFailed {
        transient: bool,
        attempts: u32,
        detail: String,
    },

    /// A single model call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory), place the library\n\
in the working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudyError {
    /// `true` when retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StudyError::ModelCallFailed { transient, .. } => *transient,
            StudyError::ModelTimeout { .. } => true,
            _ => false,
        }
    }

    /// `true` for errors caused by the uploaded file rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StudyError::UnsupportedFormat { .. }
                | StudyError::CorruptDocument { .. }
                | StudyError::PasswordRequired
                | StudyError::EmptyDocument { .. }
        )
    }
}
