//! Configuration for study-aid generation.
//!
//! Every knob that influences a run lives in [`StudyConfig`], built via
//! [`StudyConfigBuilder`]. The config is cheap to clone and is shared between
//! concurrent requests by the HTTP server.
//!
//! Model credentials are *not* part of the config: edgequake-llm reads them
//! from the environment (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …) when the
//! provider is created.

use crate::error::StudyError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Provider used when neither a provider nor a provider name is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for a study task.
///
/// # Example
/// ```rust
/// use edgequake_study::StudyConfig;
///
/// let config = StudyConfig::builder()
///     .provider_name("openai")
///     .model("gpt-4.1-mini")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Clone)]
pub struct StudyConfig {
    /// Model identifier, e.g. "gemini-2.0-flash". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, uses [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Study aids should stay close to the document; a little variety keeps
    /// quiz questions from repeating the summary word for word.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A study sheet for a 40-page course easily exceeds 4 000 output tokens,
    /// and a truncated response is unparseable JSON.
    pub max_tokens: usize,

    /// Retries on a transient model failure (429, 5xx, timeout). Default: 2.
    ///
    /// Fatal errors (bad API key, invalid request) are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call model timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Fail with [`StudyError::EmptyDocument`] instead of sending an empty
    /// document to the model. Default: false.
    pub reject_empty_documents: bool,

    /// Receives pipeline events (extraction done, retries, completion).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            reject_empty_documents: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("reject_empty_documents", &self.reject_empty_documents)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn StudyProgressCallback>"),
            )
            .finish()
    }
}

impl StudyConfig {
    /// Create a new builder for `StudyConfig`.
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model identifier actually used.
    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Provider name actually used when no pre-built provider is set.
    pub fn effective_provider_name(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

/// Builder for [`StudyConfig`].
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl fmt::Debug for StudyConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl StudyConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn reject_empty_documents(mut self, v: bool) -> Self {
        self.config.reject_empty_documents = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyConfig, StudyError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(StudyError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(StudyError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if matches!(&c.model, Some(m) if m.trim().is_empty()) {
            return Err(StudyError::InvalidConfig("model must not be empty".into()));
        }
        if matches!(&c.provider_name, Some(p) if p.trim().is_empty()) {
            return Err(StudyError::InvalidConfig(
                "provider_name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
