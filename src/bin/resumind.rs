//! CLI binary for resumind.
//!
//! A thin shim over the library crate: maps flags to `AnalysisConfig`,
//! drives the pipeline and prints records.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use resumind::{
    format_size, AnalysisConfig, AnalysisPipeline, AnalysisProgressCallback, AnalysisRequest,
    BlobFile, CancellationToken, FeedbackState, Phase, PipelineStatus, RecordStore, ResumeRecord,
    ScoreBand, TipKind, WipeCoordinator, WipeWorkflow,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn banded(score: u8) -> String {
    let text = format!("{score:>3}/100");
    match ScoreBand::of(score) {
        ScoreBand::Strong => green(&text),
        ScoreBand::Fair => yellow(&text),
        ScoreBand::Weak => red(&text),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}";

/// Spinner that shows the current pipeline phase.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("resumind");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_status(&self, status: &PipelineStatus) {
        match status.phase {
            Phase::Completed => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", green("✔"), status.message);
            }
            Phase::Failed => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", red("✘"), status.message);
            }
            _ => {
                if let Some(prev) = self.bar.message().strip_suffix('…') {
                    if !prev.is_empty() {
                        self.bar.println(format!("  {} {}", green("✓"), dim(prev)));
                    }
                }
                let msg = status.message.trim_end_matches("...");
                self.bar.set_message(format!("{msg}…"));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Score a résumé for a job
  resumind analyze resume.pdf --title "Backend Engineer" --company Acme \
      --description-file job.txt

  # List stored analyses, then show one
  resumind list
  resumind show 5b1c0e8e-2f0e-4f43-9b3a-0c3c1f0d9a11

  # Finish a draft whose analysis failed
  resumind retry 5b1c0e8e-2f0e-4f43-9b3a-0c3c1f0d9a11

  # Delete every stored file and record
  resumind wipe --yes

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise ./ then the system library)
  RESUMIND_DATA_DIR       Directory holding files/ and kv.json
"#;

/// Score résumés against a job description using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "resumind",
    version,
    about = "Score résumés against a job description using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding stored résumés, previews and records.
    #[arg(long, global = true, env = "RESUMIND_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Print JSON instead of formatted text.
    #[arg(long, global = true, env = "RESUMIND_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "RESUMIND_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESUMIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RESUMIND_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a résumé PDF and score it.
    Analyze(AnalyzeArgs),
    /// Show one stored analysis.
    Show {
        /// Record id.
        id: String,
    },
    /// List stored analyses.
    List,
    /// Re-run scoring for a pending draft.
    Retry {
        /// Record id.
        id: String,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Delete every stored file and record.
    Wipe {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
        /// Blob directory to wipe, relative to the files root.
        #[arg(long, env = "RESUMIND_ARTIFACT_ROOT", default_value = "./")]
        artifact_root: String,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Résumé PDF.
    file: PathBuf,

    /// Job title the résumé targets.
    #[arg(long, env = "RESUMIND_JOB_TITLE")]
    title: String,

    /// Company name.
    #[arg(long, env = "RESUMIND_COMPANY", default_value = "")]
    company: String,

    /// Job description text.
    #[arg(long, env = "RESUMIND_JOB_DESCRIPTION", conflicts_with = "description_file")]
    description: Option<String>,

    /// Read the job description from a file.
    #[arg(long, env = "RESUMIND_JOB_DESCRIPTION_FILE")]
    description_file: Option<PathBuf>,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Longest edge of the page image in pixels (100–10000).
    #[arg(long, env = "RESUMIND_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Max LLM output tokens.
    #[arg(long, env = "RESUMIND_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RESUMIND_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries on LLM failure (at most 10).
    #[arg(long, env = "RESUMIND_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "RESUMIND_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Text file with a custom instruction template.
    #[arg(long, env = "RESUMIND_INSTRUCTIONS")]
    instructions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; library INFO logs would tear it.
    let spinner = shows_spinner(&cli);
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

    match &cli.command {
        Command::Analyze(args) => run_analyze(&cli, args, spinner).await,
        Command::Retry { id, llm } => run_retry(&cli, id, llm, spinner).await,
        Command::Show { id } => run_show(&cli, id).await,
        Command::List => run_list(&cli).await,
        Command::Wipe { yes, artifact_root } => run_wipe(&cli, *yes, artifact_root).await,
    }
}

fn shows_spinner(cli: &Cli) -> bool {
    matches!(cli.command, Command::Analyze(_) | Command::Retry { .. })
        && !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.verbose
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    token
}

async fn run_analyze(cli: &Cli, args: &AnalyzeArgs, spinner: bool) -> Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "resume.pdf".to_string());

    let job_description = match (&args.description, &args.description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path))?,
        (None, None) => String::new(),
    };

    let config = build_config(&args.llm).await?;
    let pipeline = AnalysisPipeline::open_local(&cli.data_dir, config)
        .context("Failed to set up the analysis pipeline")?;

    let request = AnalysisRequest {
        file: BlobFile::new(name, data),
        company_name: args.company.clone(),
        job_title: args.title.clone(),
        job_description,
    };
    let cancel = cancel_on_ctrl_c();
    let result = if spinner {
        let cb = CliProgressCallback::new();
        pipeline.analyze_with(request, &cb, &cancel).await
    } else {
        pipeline
            .analyze_with(request, &resumind::NoopProgressCallback, &cancel)
            .await
    };

    match result {
        Ok(record) => print_record(cli, &record),
        Err(e) => {
            if e.leaves_draft() && !cli.quiet {
                eprintln!(
                    "{} the draft was kept; find it with `resumind list` and finish it with `resumind retry <id>`",
                    dim("note:")
                );
            }
            Err(e).context("Analysis failed")
        }
    }
}

async fn run_retry(cli: &Cli, id: &str, llm: &LlmArgs, spinner: bool) -> Result<()> {
    let config = build_config(llm).await?;
    let pipeline = AnalysisPipeline::open_local(&cli.data_dir, config)
        .context("Failed to set up the analysis pipeline")?;
    let cancel = cancel_on_ctrl_c();
    let record = if spinner {
        let cb = CliProgressCallback::new();
        pipeline.reanalyze_with(id, &cb, &cancel).await
    } else {
        pipeline
            .reanalyze_with(id, &resumind::NoopProgressCallback, &cancel)
            .await
    }
    .with_context(|| format!("Retry of {id} failed"))?;
    print_record(cli, &record)
}

async fn run_show(cli: &Cli, id: &str) -> Result<()> {
    let records = RecordStore::open_local(&cli.data_dir);
    let review = records
        .load_review(id)
        .await
        .with_context(|| format!("Failed to load {id}"))?;
    print_record(cli, &review.record)?;
    if !cli.json && !cli.quiet {
        let size = |blob: &Option<Vec<u8>>| match blob {
            Some(bytes) => format_size(bytes.len() as u64),
            None => red("missing"),
        };
        println!(
            "{}  résumé {}  preview {}",
            dim("files:"),
            size(&review.resume_pdf),
            size(&review.preview_png)
        );
    }
    Ok(())
}

async fn run_list(cli: &Cli) -> Result<()> {
    let records = RecordStore::open_local(&cli.data_dir)
        .list_records()
        .await
        .context("Failed to list records")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("Failed to serialise records")?
        );
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", dim("No résumés analysed yet."));
        return Ok(());
    }
    for record in &records {
        let score = match &record.feedback {
            FeedbackState::Scored(f) => banded(f.overall_score),
            FeedbackState::Pending => yellow("pending"),
        };
        println!(
            "{}  {}  {} {}",
            dim(&record.id),
            score,
            bold(&record.job_title),
            if record.company_name.is_empty() {
                String::new()
            } else {
                dim(&format!("@ {}", record.company_name))
            }
        );
    }
    Ok(())
}

async fn run_wipe(cli: &Cli, yes: bool, artifact_root: &str) -> Result<()> {
    let records = RecordStore::open_local(&cli.data_dir);
    let coordinator = WipeCoordinator::new(
        records.blobs().clone(),
        records.kv().clone(),
        artifact_root,
    );
    let workflow = WipeWorkflow::new();

    let items = coordinator
        .list_artifacts()
        .await
        .context("Failed to list stored files")?;
    if !cli.quiet && !cli.json {
        println!("{} stored files:", bold(&items.len().to_string()));
        for item in &items {
            println!("  {}  {}", item.name, dim(&format_size(item.size)));
        }
    }

    workflow.request()?;
    if !yes && !confirm("Delete all stored files and records?")? {
        workflow.cancel()?;
        eprintln!("{}", dim("Wipe cancelled."));
        return Ok(());
    }

    let report = workflow.confirm(&coordinator).await?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{} {} deleted, {} failed",
            if report.is_clean() { green("✔") } else { cyan("⚠") },
            bold(&report.succeeded.to_string()),
            report.failed.len()
        );
        for err in &report.errors {
            eprintln!("  {} {}", red("✗"), err);
        }
        if let Some(ref e) = report.flush_error {
            eprintln!("  {} record flush failed: {}", red("✗"), e);
        }
        if let Some(ref e) = report.list_error {
            eprintln!("  {} listing failed: {}", red("✗"), e);
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_record(cli: &Cli, record: &ResumeRecord) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(record).context("Failed to serialise record")?
        );
        return Ok(());
    }
    if cli.quiet {
        println!("{}", record.id);
        return Ok(());
    }

    println!("{}  {}", bold(&record.job_title), dim(&record.company_name));
    println!("{} {}", dim("id:"), record.id);
    let Some(feedback) = record.scored() else {
        println!("{}", yellow("Feedback pending."));
        return Ok(());
    };

    let band = ScoreBand::of(feedback.overall_score);
    println!(
        "\n{} {}  {}",
        bold("Overall"),
        banded(feedback.overall_score),
        dim(band.label())
    );
    println!("  {:<16}{}", "ATS", banded(feedback.ats.score));
    for tip in &feedback.ats.tips {
        print_tip(tip.kind, &tip.tip, tip.explanation.as_deref());
    }
    for (name, category) in feedback.categories() {
        println!("  {:<16}{}", name, banded(category.score));
        for tip in &category.tips {
            print_tip(tip.kind, &tip.tip, tip.explanation.as_deref());
        }
    }
    Ok(())
}

fn print_tip(kind: TipKind, tip: &str, explanation: Option<&str>) {
    let mark = match kind {
        TipKind::Good => green("✓"),
        TipKind::Improve => yellow("!"),
    };
    println!("      {mark} {tip}");
    if let Some(text) = explanation {
        println!("        {}", dim(text));
    }
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(llm: &LlmArgs) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .max_rendered_pixels(llm.max_pixels)
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout);

    if let Some(ref model) = llm.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = llm.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = llm.instructions {
        builder = builder.instructions(read_template(path).await?);
    }

    builder.build().context("Invalid configuration")
}

async fn read_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read instructions from {:?}", path))
}
