//! CLI parsing and orchestration. Parses args, downloads the story or series,
//! renders it as HTML, text, or Markdown, and writes or streams the result.
//! Maps errors to exit codes.

use crate::config::{self, Config};
use crate::formats::OutputFormat;
use crate::scraper::url::story_slug;
use crate::scraper::{
    download_document, validate_options, Document, DownloadOptions, EventSink, HttpFetcher,
    ProgressEvent, ScraperError,
};
use clap::Parser;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const USAGE_HINT: &str = "Usage: litscrape <URL> [options]
  URL is a story (https://www.literotica.com/s/<slug>) or a series
  (https://www.literotica.com/series/se/<id>). Run with --help for options.";

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("Nothing could be retrieved from {url}")]
    NothingRetrieved { url: String },

    #[error("Cannot write output {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) | CliRunError::NothingRetrieved { .. } => 2,
            CliRunError::Write { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "litscrape")]
#[command(about = "Download Literotica stories and series as HTML, text, or Markdown")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, user_agents, timeout_secs, format) are read from ./litscrape.toml or $XDG_CONFIG_HOME/litscrape/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Story or series URL.
    pub url: Option<String>,

    /// Output file. Its extension is replaced by the format's. Default: ./{story-slug}.{ext}
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: html, txt, or md (default html, or config `format`).
    #[arg(short = 'e', long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Use the classic page layout (classic.literotica.com).
    #[arg(short, long)]
    pub classic: bool,

    /// Download the whole series the story belongs to.
    #[arg(short, long)]
    pub series: bool,

    /// Do not insert "Page N:" indicators between pages.
    #[arg(short = 'n', long)]
    pub nopages: bool,

    /// HTML only: do not turn line breaks into <br />.
    #[arg(long)]
    pub no_break: bool,

    /// Print the document to stdout instead of writing a file.
    #[arg(short = 'd', long)]
    pub stream: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Narrate every step and print the error chain.
    #[arg(long)]
    pub verbose: bool,

    /// HTTP User-Agent (overrides config and the built-in pool).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>()
        .map_err(|_| format!("Invalid --format value: '{}'. Use html, txt, or md.", s))
}

/// Classification problems are the caller's input; show usage with them.
fn input_error(e: ScraperError) -> CliRunError {
    if e.is_classification() {
        CliRunError::InvalidInput(format!("{}\n\n{}", e, USAGE_HINT))
    } else {
        CliRunError::Scraper(e)
    }
}

/// Sanitize a title to a safe filename: lowercase, replace spaces/special with `-`.
fn sanitize_title(title: &str) -> String {
    let mut s = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    // Collapse multiple dashes and trim
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "story".to_string();
    }
    s
}

/// File stem when -o is not given: story slug, first member's slug for a
/// series, else the sanitized title.
fn default_stem(document: &Document) -> String {
    let slug = match document {
        Document::Story(s) => story_slug(&s.source_url),
        Document::Series(s) => s.first_story_slug(),
    };
    slug.unwrap_or_else(|| {
        let title = match document {
            Document::Story(s) => s.title(),
            Document::Series(s) => s.title(),
        };
        sanitize_title(title)
    })
}

fn output_path(
    output: Option<&Path>,
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> PathBuf {
    match output {
        Some(p) => p.with_extension(format.extension()),
        None => output_dir.join(format!("{}.{}", stem, format.extension())),
    }
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

fn build_options(args: &Args, config: &Config) -> Result<DownloadOptions, CliRunError> {
    let format = match args.format {
        Some(f) => f,
        None => config
            .output_format()
            .map_err(CliRunError::InvalidInput)?
            .unwrap_or_default(),
    };
    Ok(DownloadOptions {
        url: args.url.clone().unwrap_or_default(),
        format,
        classic: args.classic,
        series: args.series,
        no_page_numbers: args.nopages,
        no_paragraph_break: args.no_break,
    })
}

fn build_fetcher(args: &Args, config: &Config) -> Result<HttpFetcher, CliRunError> {
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let timeout_secs = args
        .timeout
        .or(config.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let mut builder = HttpFetcher::builder().timeout_secs(timeout_secs);
    if let Some(pool) = config.user_agents.clone() {
        builder = builder.user_agents(pool);
    }
    if let Some(ua) = args.user_agent.clone().or_else(|| config.user_agent.clone()) {
        builder = builder.user_agent(ua);
    }
    let fetcher = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    tracing::debug!(user_agent = fetcher.user_agent(), timeout_secs, "http client ready");
    Ok(fetcher)
}

/// Drain progress events into a spinner. Event lines themselves reach the
/// terminal through the tracing mirror in [EventSink::emit].
fn spawn_progress(mut rx: UnboundedReceiver<ProgressEvent>, show: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = show.then(|| {
            let pb = indicatif::ProgressBar::new_spinner();
            let style = indicatif::ProgressStyle::default_spinner()
                .template("{spinner} {msg} ({elapsed})")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        });
        while let Some(event) = rx.recv().await {
            if let Some(ref pb) = spinner {
                pb.set_message(event.to_string());
            }
        }
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
    })
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub async fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config()
        .map_err(CliRunError::InvalidInput)?
        .unwrap_or_default();
    let options = build_options(args, &config)?;
    // Reject bad input before any client is built or request made.
    validate_options(&options).map_err(input_error)?;
    let fetcher = build_fetcher(args, &config)?;

    let (events, rx) = EventSink::channel();
    let progress = spawn_progress(rx, !args.quiet);
    let result = download_document(&options, &fetcher, &events).await;
    drop(events);
    if let Err(e) = progress.await {
        tracing::debug!("progress display ended abnormally: {e}");
    }
    let (document, text) = result.map_err(input_error)?;

    if document.pages_completed() == 0 {
        return Err(CliRunError::NothingRetrieved {
            url: options.url.clone(),
        });
    }

    if args.stream {
        let mut stdout = std::io::stdout().lock();
        return stdout
            .write_all(text.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|source| CliRunError::Write {
                path: PathBuf::from("<stdout>"),
                source,
            });
    }

    let output_dir = config.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let path = output_path(
        args.output.as_deref(),
        &output_dir,
        &default_stem(&document),
        options.format,
    );
    validate_output_path(&path)?;
    std::fs::write(&path, text).map_err(|source| CliRunError::Write {
        path: path.clone(),
        source,
    })?;

    if !args.quiet {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
