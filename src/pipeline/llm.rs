//! Model interaction: send the prompt, retry transient failures.
//!
//! The core only sees the [`ModelClient`] trait; [`LlmClient`] is the
//! production adapter over an edgequake-llm provider. Tests and embedders
//! inject their own implementation instead of configuring a global client.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^(retry-1)`) with the
//! default 500 ms base and 2 retries waits 500 ms, then 1 s. Authentication
//! and invalid-request errors fail immediately.

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Raw output of one successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Calls made, including the successful one.
    pub attempts: u32,
}

/// Anything that turns a prompt into raw model text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, StudyError>;
}

// ── Error classification ─────────────────────────────────────────────────

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

static RE_FATAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(400|401|403|404)\b|unauthori[sz]ed|forbidden|permission|api[ _-]?key|authenticat|invalid[ _-]?(request|argument)|not[ _-]found",
    )
    .unwrap()
});

/// Classify a provider error by its message.
///
/// Providers surface HTTP failures as strings, so this looks for status codes
/// and well-known phrases. Anything unrecognised (connection resets, 429, 5xx,
/// "overloaded") is treated as transient.
pub fn classify_error(message: &str) -> ErrorClass {
    if RE_FATAL.is_match(message) {
        ErrorClass::Fatal
    } else {
        ErrorClass::Transient
    }
}

// ── Retry loop ───────────────────────────────────────────────────────────

/// Timeout and retry budget for model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StudyConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            call_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Run `call` under `policy`, returning its value and the number of calls made.
///
/// Each call is bounded by `policy.call_timeout`. Fatal errors stop at once;
/// transient errors and timeouts are retried up to `policy.max_retries` times.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    progress: Option<&ProgressCallback>,
    mut call: F,
) -> Result<(T, u32), StudyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_err = String::new();
    let mut last_timed_out = false;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "Model call: retry {}/{} after {}ms",
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            if let Some(cb) = progress {
                cb.on_model_retry(attempt, policy.max_retries, &last_err);
            }
            sleep(backoff).await;
        }

        match timeout(policy.call_timeout, call()).await {
            Ok(Ok(value)) => return Ok((value, attempt + 1)),
            Ok(Err(msg)) => {
                warn!("Model call: attempt {} failed: {}", attempt + 1, msg);
                if classify_error(&msg) == ErrorClass::Fatal {
                    return Err(StudyError::ModelCallFailed {
                        transient: false,
                        attempts: attempt + 1,
                        detail: msg,
                    });
                }
                last_err = msg;
                last_timed_out = false;
            }
            Err(_) => {
                warn!(
                    "Model call: attempt {} timed out after {:?}",
                    attempt + 1,
                    policy.call_timeout
                );
                last_err = format!("timed out after {:?}", policy.call_timeout);
                last_timed_out = true;
            }
        }
    }

    if last_timed_out {
        return Err(StudyError::ModelTimeout {
            secs: policy.call_timeout.as_secs(),
        });
    }
    Err(StudyError::ModelCallFailed {
        transient: true,
        attempts: policy.max_retries + 1,
        detail: last_err,
    })
}

// ── Production client ────────────────────────────────────────────────────

/// [`ModelClient`] backed by an edgequake-llm provider.
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
    policy: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.label)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("policy", &self.policy)
            .finish()
    }
}

impl LlmClient {
    /// Wrap an existing provider; sampling and retry settings come from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &StudyConfig) -> Self {
        Self {
            provider,
            label: config.effective_model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            policy: RetryPolicy::from_config(config),
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve the provider from the config.
    ///
    /// 1. **Pre-built provider** (`config.provider`): used as-is.
    /// 2. **Named provider** (`config.provider_name`, default `gemini`) with
    ///    `config.model` (default `gemini-2.0-flash`), created through
    ///    [`ProviderFactory::create_llm_provider`], which reads the matching
    ///    API key (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …) from the environment.
    ///
    /// A missing key is reported as [`StudyError::ProviderNotConfigured`];
    /// callers treat it as a fatal startup condition.
    pub fn from_config(config: &StudyConfig) -> Result<Self, StudyError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        let name = config.effective_provider_name();
        let model = config.effective_model();
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            StudyError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!(
                    "Could not create provider '{}' with model '{}'.\n\
                    Set the provider's API key (e.g. GEMINI_API_KEY) or choose another \
                    provider with EDGEQUAKE_LLM_PROVIDER / EDGEQUAKE_MODEL.\n\
                    Error: {}",
                    name, model, e
                ),
            }
        })?;

        info!("Using LLM provider '{}' with model '{}'", name, model);
        let mut client = Self::new(provider, config);
        client.label = format!("{}/{}", name, model);
        Ok(client)
    }

    /// Provider/model label for logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, StudyError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.options();
        let (provider, messages, options) = (&self.provider, &messages, &options);

        let (response, attempts) =
            call_with_retry(&self.policy, self.progress.as_ref(), move || async move {
                provider
                    .chat(messages, Some(options))
                    .await
                    .map_err(|e| format!("{}", e))
            })
            .await?;

        debug!(
            "{}: {} input tokens, {} output tokens, {} attempt(s)",
            self.label, response.prompt_tokens, response.completion_tokens, attempts
        );

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            attempts,
        })
    }
}
