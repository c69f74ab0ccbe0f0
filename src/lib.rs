//! # edgequake-study
//!
//! Turn course documents (PDF, DOCX, PPTX) into study aids with an LLM:
//! a summary with question lists and revision cards, a basic quiz, or a
//! multiple-choice quiz with justified answers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (filename + bytes)
//!  │
//!  ├─ 1. Format    pick the backend from the extension (case-insensitive)
//!  ├─ 2. Extract   pdfium / OOXML readers, on the blocking pool
//!  ├─ 3. Assemble  "[PAGE n]\n…" segments joined by blank lines
//!  ├─ 4. Prompt    task template + document, never truncated
//!  ├─ 5. Model     one call through edgequake-llm, retried on 429 / 5xx
//!  └─ 6. Parse     recover the JSON object, or return the empty shape
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_study::{generate_graded_quiz, LlmClient, StudyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini by default; reads GEMINI_API_KEY.
//!     let config = StudyConfig::default();
//!     let client = LlmClient::from_config(&config)?;
//!
//!     let bytes = std::fs::read("cours.pptx")?;
//!     let output = generate_graded_quiz("cours.pptx", bytes, &client, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.result)?);
//!     eprintln!("{} question(s), parse {:?}",
//!         output.result.questions.len(),
//!         output.stats.parse_outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP API ([`server`]) |
//! | `cli`    | on      | The `edgequake-study` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable both when embedding only the library:
//! ```toml
//! edgequake-study = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod study;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{StudyConfig, StudyConfigBuilder, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use document::{Document, PageSegment};
pub use error::{StudyError, UNSUPPORTED_FORMAT_MESSAGE};
pub use format::DocumentFormat;
pub use output::{
    numbered_items, Answer, BasicQuiz, GradedQuestion, GradedQuiz, ParseOutcome, QuestionLists,
    QuizEntry, RevisionCard, RunStats, StudyMaterial, Task, TaskOutput, TaskResult,
};
pub use pipeline::llm::{Generation, LlmClient, ModelClient};
pub use pipeline::parse::parse_response;
pub use progress::{NoopProgressCallback, ProgressCallback, StudyProgressCallback};
pub use study::{generate_graded_quiz, generate_quiz, generate_study_material, run_task};
