//! Top-level entry points: one uploaded document in, one study aid out.
//!
//! Every task runs the same sequence:
//!
//! ```text
//! filename ─▶ format ─▶ extract ─▶ assemble ─▶ prompt ─▶ model ─▶ parse
//! ```
//!
//! The format check comes first so an unsupported upload is rejected before
//! any byte is parsed. Only [`StudyError`]s stop a run; a model response
//! without usable JSON still yields a (empty) result, see
//! [`crate::pipeline::parse`].

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::extract;
use crate::format::DocumentFormat;
use crate::output::{BasicQuiz, GradedQuiz, RunStats, StudyMaterial, TaskOutput, TaskResult};
use crate::pipeline::llm::ModelClient;
use crate::pipeline::parse::parse_response;
use crate::prompts::build_prompt;
use std::time::Instant;
use tracing::{info, warn};

/// Run a study task on an uploaded document.
///
/// # Arguments
///
/// * `filename` — the upload's name; only its extension is used
/// * `bytes`    — the raw document
/// * `client`   — model client (injected; see [`crate::pipeline::llm::LlmClient`])
/// * `config`   — run configuration
///
/// # Errors
///
/// Returns `Err(StudyError)` for an unsupported extension, a document that
/// cannot be opened, an empty document when
/// [`StudyConfig::reject_empty_documents`] is set, or a failed model call.
pub async fn run_task<T: TaskResult>(
    filename: &str,
    bytes: Vec<u8>,
    client: &dyn ModelClient,
    config: &StudyConfig,
) -> Result<TaskOutput<T>, StudyError> {
    let total_start = Instant::now();
    let task = T::TASK;

    // ── Step 1: Format ───────────────────────────────────────────────────
    let format = DocumentFormat::from_filename(filename)?;
    info!(
        "{}: '{}' ({}, {} bytes)",
        task.name(),
        filename,
        format,
        bytes.len()
    );

    // ── Step 2: Extract + assemble ───────────────────────────────────────
    let extract_start = Instant::now();
    let document = extract::extract(bytes, format).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    if let Some(cb) = &config.progress_callback {
        cb.on_extracted(format, document.segments.len(), document.skipped_units.len());
    }

    if document.is_empty() {
        if config.reject_empty_documents {
            return Err(StudyError::EmptyDocument {
                filename: filename.to_string(),
            });
        }
        warn!(
            "{}: '{}' has no extractable text; sending an empty document",
            task.name(),
            filename
        );
    }

    let assembled = document.assemble();

    // ── Step 3: Prompt ───────────────────────────────────────────────────
    let prompt = build_prompt(task, &assembled);
    let prompt_chars = prompt.chars().count();
    if let Some(cb) = &config.progress_callback {
        cb.on_model_start(prompt_chars);
    }

    // ── Step 4: Model ────────────────────────────────────────────────────
    let model_start = Instant::now();
    let generation = client.generate(&prompt).await?;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;

    // ── Step 5: Parse ────────────────────────────────────────────────────
    let parsed = parse_response::<T>(&generation.text);
    if let Some(cb) = &config.progress_callback {
        cb.on_complete(parsed.outcome, parsed.discarded);
    }

    let stats = RunStats {
        task,
        format,
        segments: document.segments.len(),
        source_units: document.source_units,
        skipped_units: document.skipped_units.clone(),
        document_chars: assembled.chars().count(),
        prompt_chars,
        parse_outcome: parsed.outcome,
        discarded_items: parsed.discarded,
        model_attempts: generation.attempts,
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
        extract_duration_ms,
        model_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "{}: done in {}ms ({} segments, parse {:?}, {} attempt(s))",
        task.name(),
        stats.total_duration_ms,
        stats.segments,
        stats.parse_outcome,
        stats.model_attempts
    );

    Ok(TaskOutput {
        result: parsed.value,
        stats,
    })
}

/// Summary, question lists and revision cards (`/analyser/`).
pub async fn generate_study_material(
    filename: &str,
    bytes: Vec<u8>,
    client: &dyn ModelClient,
    config: &StudyConfig,
) -> Result<TaskOutput<StudyMaterial>, StudyError> {
    run_task(filename, bytes, client, config).await
}

/// Basic quiz (`/generate-quiz/`).
pub async fn generate_quiz(
    filename: &str,
    bytes: Vec<u8>,
    client: &dyn ModelClient,
    config: &StudyConfig,
) -> Result<TaskOutput<BasicQuiz>, StudyError> {
    run_task(filename, bytes, client, config).await
}

/// Multiple-choice quiz with justified answers (`/generate-graded-quiz/`).
pub async fn generate_graded_quiz(
    filename: &str,
    bytes: Vec<u8>,
    client: &dyn ModelClient,
    config: &StudyConfig,
) -> Result<TaskOutput<GradedQuiz>, StudyError> {
    run_task(filename, bytes, client, config).await
}
