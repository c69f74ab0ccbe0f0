//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn StudyProgressCallback>`] via
//! [`crate::config::StudyConfigBuilder::progress_callback`] to observe a run:
//! the CLI drives its spinner from these events, a server could forward them
//! to a WebSocket. The library knows nothing about how the host reports
//! progress.
//!
//! # Example
//!
//! ```rust
//! use edgequake_study::{StudyConfig, StudyProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct RetryCounter(AtomicU32);
//!
//! impl StudyProgressCallback for RetryCounter {
//!     fn on_model_retry(&self, attempt: u32, max_retries: u32, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("retry {attempt}/{max_retries}: {error}");
//!     }
//! }
//!
//! let config = StudyConfig::builder()
//!     .progress_callback(Arc::new(RetryCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::format::DocumentFormat;
use crate::output::ParseOutcome;
use std::sync::Arc;

/// Called by the pipeline as a task progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The server runs many requests at once, so
/// implementations shared across requests must synchronise their state.
pub trait StudyProgressCallback: Send + Sync {
    /// Text extraction finished.
    ///
    /// # Arguments
    /// * `format`   — detected document format
    /// * `segments` — non-empty segments that will be sent to the model
    /// * `skipped`  — pages or slides dropped for lack of text
    fn on_extracted(&self, format: DocumentFormat, segments: usize, skipped: usize) {
        let _ = (format, segments, skipped);
    }

    /// The model request is about to be sent.
    fn on_model_start(&self, prompt_chars: usize) {
        let _ = prompt_chars;
    }

    /// A transient model failure will be retried.
    ///
    /// # Arguments
    /// * `attempt`     — 1-based retry number
    /// * `max_retries` — configured retry budget
    /// * `error`       — human-readable cause of the previous failure
    fn on_model_retry(&self, attempt: u32, max_retries: u32, error: &str) {
        let _ = (attempt, max_retries, error);
    }

    /// The response was parsed.
    fn on_complete(&self, outcome: ParseOutcome, discarded: usize) {
        let _ = (outcome, discarded);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl StudyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudyConfig`].
pub type ProgressCallback = Arc<dyn StudyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        retries: AtomicUsize,
        outcome: Mutex<Option<ParseOutcome>>,
    }

    impl StudyProgressCallback for Recorder {
        fn on_model_retry(&self, _attempt: u32, _max_retries: u32, _error: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_complete(&self, outcome: ParseOutcome, _discarded: usize) {
            *self.outcome.lock().unwrap() = Some(outcome);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extracted(DocumentFormat::Pdf, 3, 1);
        cb.on_model_start(1200);
        cb.on_model_retry(1, 2, "HTTP 503");
        cb.on_complete(ParseOutcome::Fallback, 0);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_extracted(DocumentFormat::Docx, 1, 0);
        cb.on_model_retry(1, 2, "429");
        cb.on_model_retry(2, 2, "429");
        cb.on_complete(ParseOutcome::Embedded, 0);
        assert_eq!(rec.retries.load(Ordering::SeqCst), 2);
        assert_eq!(*rec.outcome.lock().unwrap(), Some(ParseOutcome::Embedded));
    }
}
