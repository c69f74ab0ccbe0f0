//! CLI binary for edgequake-study.
//!
//! `serve` runs the HTTP API; `run` executes one task on a local file and
//! prints the JSON result. Both map flags onto `StudyConfig` and build the
//! model client once at startup, so a missing API key fails fast.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_study::server::{self, AppState, ServerConfig};
use edgequake_study::{
    generate_graded_quiz, generate_quiz, generate_study_material, DocumentFormat, LlmClient,
    ParseOutcome, ProgressCallback, StudyConfig, StudyProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the run: extraction, model call, retries, parse.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(filename: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.set_message(filename.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl StudyProgressCallback for CliProgressCallback {
    fn on_extracted(&self, format: DocumentFormat, segments: usize, skipped: usize) {
        let mut line = format!("  {} {} text extracted: {} segment(s)", green("✓"), format, segments);
        if skipped > 0 {
            line.push_str(&format!("  {}", yellow(&format!("{skipped} without text"))));
        }
        self.bar.println(line);
    }

    fn on_model_start(&self, prompt_chars: usize) {
        self.bar.set_prefix("Generating");
        self.bar.set_message(dim(&format!("{prompt_chars} chars sent")));
    }

    fn on_model_retry(&self, attempt: u32, max_retries: u32, error: &str) {
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} retry {}/{}  {}",
            yellow("↻"),
            attempt,
            max_retries,
            dim(&msg)
        ));
    }

    fn on_complete(&self, outcome: ParseOutcome, discarded: usize) {
        self.bar.finish_and_clear();
        let status = match outcome {
            ParseOutcome::Strict | ParseOutcome::Embedded => green("✔"),
            ParseOutcome::Fallback => yellow("⚠"),
        };
        let mut line = format!("{status} response parsed ({outcome:?})");
        if discarded > 0 {
            line.push_str(&format!(", {discarded} malformed item(s) dropped"));
        }
        eprintln!("{line}");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API on 0.0.0.0:8000
  edgequake-study serve --bind 0.0.0.0

  # Revision sheet for a PDF course
  edgequake-study run study-material cours.pdf

  # Graded quiz from slides, with run statistics
  edgequake-study run graded-quiz slides.pptx --stats

  # Use another provider
  edgequake-study --provider openai --model gpt-4.1-mini run quiz notes.docx

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Provider (gemini, openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Model ID (default: gemini-2.0-flash)
  PDFIUM_LIB_PATH         Path to libpdfium, or the directory holding it
  STUDY_BIND              Listen address for `serve` (default 127.0.0.1)
  STUDY_PORT              Listen port for `serve` (default 8000)
  STUDY_ALLOWED_ORIGINS   Comma-separated CORS origins
  STUDY_MAX_UPLOAD_BYTES  Upload size limit (default 25 MiB)

A `.env` file in the working directory is loaded at startup.
"#;

/// Turn course documents into summaries, revision cards and quizzes.
#[derive(Parser, Debug)]
#[command(
    name = "edgequake-study",
    version,
    about = "Turn PDF, DOCX and PPTX course material into study aids using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STUDY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STUDY_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM provider: gemini, openai, anthropic, ollama, …
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "STUDY_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "STUDY_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries on transient LLM failures.
    #[arg(long, global = true, env = "STUDY_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "STUDY_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Fail instead of querying the model when a document has no text.
    #[arg(long, global = true, env = "STUDY_REJECT_EMPTY")]
    reject_empty: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address (overrides STUDY_BIND).
        #[arg(long)]
        bind: Option<String>,

        /// Listen port (overrides STUDY_PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one task on a local file and print the JSON result.
    Run {
        /// What to generate.
        #[arg(value_enum)]
        task: TaskArg,

        /// Path to a .pdf, .docx, .doc, .pptx or .ppt file.
        file: PathBuf,

        /// Print `{result, stats}` instead of the bare result.
        #[arg(long)]
        stats: bool,

        /// Compact JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "STUDY_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TaskArg {
    /// Summary, question lists and revision cards (`/analyser/`).
    #[value(alias = "analyser")]
    StudyMaterial,
    /// Basic quiz.
    Quiz,
    /// Multiple-choice quiz, one correct answer out of three.
    GradedQuiz,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // While the spinner is visible it carries the feedback; library INFO
    // logs would only break its line.
    let spinner = matches!(cli.command, Command::Run { no_progress: false, .. }) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { ref bind, port } => {
            let mut server_config = ServerConfig::from_env().context("Invalid server configuration")?;
            if let Some(bind) = bind {
                server_config.bind = bind.clone();
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            let config = build_config(&cli.model, None)?;
            let client = LlmClient::from_config(&config)
                .context("LLM provider is not configured; refusing to start")?;
            tracing::info!("Model: {}", client.label());

            let state = Arc::new(AppState {
                client: Arc::new(client),
                config,
            });
            server::serve(state, server_config)
                .await
                .context("HTTP server failed")?;
        }

        Command::Run {
            task,
            ref file,
            stats,
            compact,
            no_progress,
        } => {
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let progress: Option<ProgressCallback> = if !cli.quiet && !no_progress {
                Some(CliProgressCallback::new(&filename) as Arc<dyn StudyProgressCallback>)
            } else {
                None
            };

            let config = build_config(&cli.model, progress)?;
            let client = LlmClient::from_config(&config).context("LLM provider is not configured")?;
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let json = match task {
                TaskArg::StudyMaterial => render(
                    generate_study_material(&filename, bytes, &client, &config).await,
                    file,
                    stats,
                    compact,
                )?,
                TaskArg::Quiz => render(
                    generate_quiz(&filename, bytes, &client, &config).await,
                    file,
                    stats,
                    compact,
                )?,
                TaskArg::GradedQuiz => render(
                    generate_graded_quiz(&filename, bytes, &client, &config).await,
                    file,
                    stats,
                    compact,
                )?,
            };

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

/// Serialise a task result, or its `{result, stats}` envelope.
fn render<T: Serialize>(
    output: Result<edgequake_study::TaskOutput<T>, edgequake_study::StudyError>,
    file: &Path,
    with_stats: bool,
    compact: bool,
) -> Result<String> {
    let output = output.with_context(|| format!("Failed to process {}", file.display()))?;
    let value = if with_stats {
        serde_json::to_value(&output)
    } else {
        serde_json::to_value(&output.result)
    }
    .context("Failed to serialise output")?;

    if compact {
        serde_json::to_string(&value)
    } else {
        serde_json::to_string_pretty(&value)
    }
    .context("Failed to serialise output")
}

/// Map CLI args to `StudyConfig`.
fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<StudyConfig> {
    let mut builder = StudyConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .reject_empty_documents(args.reject_empty);

    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
