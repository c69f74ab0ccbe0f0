//! Pipeline stages that run after extraction.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ assemble ──▶ prompt ──▶ llm ──▶ parse
//! (bytes)     (document)   (template)  (model)  (JSON)
//! ```
//!
//! Extraction and assembly live in [`crate::extract`] and [`crate::document`],
//! prompt templates in [`crate::prompts`]. This module holds the two stages
//! that deal with the model:
//!
//! 1. [`llm`]   — the [`llm::ModelClient`] seam and the retrying
//!    edgequake-llm adapter; the only stage with network I/O
//! 2. [`parse`] — recover the task's JSON object from free-form model text,
//!    falling back to the empty shape

pub mod llm;
pub mod parse;
