//! apicheck CLI entrypoint
//! Parses command-line arguments and drives the core validation pipeline.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// External imports (alphabetized)
use anyhow::Context;
use apicheck_core::report::{self, Report};
use apicheck_core::{
    convert, Action, Config, Conversion, DefaultSource, Format, Pipeline, RawDocument,
    SessionHistory,
};
use clap::Parser;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apicheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML, or TOML with a `.toml` extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Upper bound in seconds for every external fetch
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Refuse to fetch http(s) references
    #[arg(long, global = true)]
    no_remote: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Validate an OpenAPI/Swagger document
    Validate {
        /// Path or URL of the document, or `-` for stdin
        location: String,
        /// Treat the document as this format instead of detecting it
        #[arg(long)]
        format: Option<Format>,
        /// Report style
        #[arg(long, value_enum, default_value_t = Output::Text)]
        output: Output,
    },
    /// Convert a document between JSON and YAML
    Convert {
        /// Path or URL of the document, or `-` for stdin
        location: String,
        /// Target format
        #[arg(long)]
        to: Format,
        /// Output file, or a directory that receives swagger.json/swagger.yaml
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Read commands from stdin and keep a history of their results
    Session,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Process exit status of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Invalid,
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Invalid => ExitCode::from(1),
            Outcome::Failed => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only reports and converted text
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            Outcome::Failed.into()
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let config = load_config(&cli).await?;
    let pipeline = Pipeline::with_defaults(config).context("Failed to initialize document source")?;

    match cli.command {
        Commands::Validate {
            location,
            format,
            output,
        } => validate_document(&pipeline, &location, format, output).await,
        Commands::Convert { location, to, out } => {
            convert_document(&pipeline, &location, to, out.as_deref()).await
        }
        Commands::Session => session(&pipeline).await,
    }
}

async fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default()
            .await
            .context("Failed to load default config")?,
    };
    if let Some(secs) = cli.timeout {
        config.fetch_timeout_secs = secs;
    }
    if cli.no_remote {
        config.allow_remote_refs = false;
    }
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

/// Read `location`, where `-` means stdin.
async fn load(
    pipeline: &Pipeline<DefaultSource>,
    location: &str,
    format: Option<Format>,
) -> anyhow::Result<Result<RawDocument, apicheck_core::PipelineError>> {
    if location == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read document from stdin")?;
        let raw = match format {
            Some(format) => RawDocument::with_format(text, format),
            None => RawDocument::new(text),
        };
        return Ok(Ok(raw));
    }

    tracing::info!("loading {location}");
    let raw = match pipeline.load(location).await {
        Ok(raw) => raw,
        Err(e) => return Ok(Err(e)),
    };
    Ok(Ok(match (format, raw.origin().cloned()) {
        (Some(format), Some(origin)) => {
            RawDocument::with_format(raw.text(), format).with_origin(origin)
        }
        (Some(format), None) => RawDocument::with_format(raw.text(), format),
        (None, _) => raw,
    }))
}

async fn validate_document(
    pipeline: &Pipeline<DefaultSource>,
    location: &str,
    format: Option<Format>,
    output: Output,
) -> anyhow::Result<Outcome> {
    let outcome = match load(pipeline, location, format).await? {
        Ok(raw) => pipeline.validate(&raw).await,
        Err(e) => Err(e),
    };

    let (text, status) = match outcome {
        Ok(result) => {
            let status = if result.is_valid() {
                Outcome::Success
            } else {
                Outcome::Invalid
            };
            let text = match output {
                Output::Text => report::format_result(&result),
                Output::Json => serde_json::to_string_pretty(&Report::from_result(&result))?,
            };
            (text, status)
        }
        Err(e) => {
            tracing::debug!(stage = %e.stage(), kind = e.kind(), "pipeline failed");
            let text = match output {
                Output::Text => report::format_error(&e),
                Output::Json => {
                    serde_json::to_string_pretty(&Report::failed(e.kind(), e.to_string()))?
                }
            };
            (text, Outcome::Failed)
        }
    };
    println!("{text}");
    Ok(status)
}

fn convert_raw(raw: &RawDocument, to: Format, indent: usize) -> anyhow::Result<Conversion> {
    let node = raw.parse_node()?;
    Ok(convert::convert_node(&node, raw.format(), to, indent)?)
}

async fn convert_document(
    pipeline: &Pipeline<DefaultSource>,
    location: &str,
    to: Format,
    out: Option<&Path>,
) -> anyhow::Result<Outcome> {
    let raw = match load(pipeline, location, None).await? {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("{}", report::format_error(&e));
            return Ok(Outcome::Failed);
        }
    };
    let conversion = match convert_raw(&raw, to, pipeline.config().json_indent) {
        Ok(conversion) => conversion,
        Err(e) => {
            eprintln!("{e}");
            return Ok(Outcome::Failed);
        }
    };
    tracing::info!("{}", conversion.action());

    match out {
        Some(out) => {
            let path = if fs::metadata(out).await.map(|m| m.is_dir()).unwrap_or(false) {
                out.join(conversion.suggested_filename())
            } else {
                out.to_path_buf()
            };
            fs::write(&path, conversion.text())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", conversion.text()),
    }
    Ok(Outcome::Success)
}

/// One line of session input.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand<'a> {
    Validate(&'a str),
    Convert(&'a str, Format),
    History,
    Quit,
}

fn parse_session_command(line: &str) -> Result<SessionCommand<'_>, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    match (command, rest.as_slice()) {
        ("validate", [location]) => Ok(SessionCommand::Validate(location)),
        ("convert", [location, target]) => Ok(SessionCommand::Convert(location, target.parse()?)),
        ("history", []) => Ok(SessionCommand::History),
        ("quit" | "exit", []) => Ok(SessionCommand::Quit),
        _ => Err(format!(
            "unknown command '{}'; expected validate <loc>, convert <loc> json|yaml, history or quit",
            line.trim()
        )),
    }
}

async fn session(pipeline: &Pipeline<DefaultSource>) -> anyhow::Result<Outcome> {
    let mut history = SessionHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read session input")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_session_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            SessionCommand::Validate(location) => {
                let (input, result) = match pipeline.load(location).await {
                    Ok(raw) => {
                        let result = match pipeline.validate(&raw).await {
                            Ok(result) => report::format_result(&result),
                            Err(e) => report::format_error(&e),
                        };
                        (raw.text().to_string(), result)
                    }
                    Err(e) => (location.to_string(), report::format_error(&e)),
                };
                println!("{result}");
                history.record(Action::Validate, input, result);
            }
            SessionCommand::Convert(location, to) => {
                let raw = match pipeline.load(location).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        println!("{}", report::format_error(&e));
                        continue;
                    }
                };
                let conversion = match convert_raw(&raw, to, pipeline.config().json_indent) {
                    Ok(conversion) => conversion,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                print!("{}", conversion.text());
                history.record(conversion.action(), raw.text(), conversion.into_text());
            }
            SessionCommand::History => print_history(&history),
            SessionCommand::Quit => break,
        }
    }

    tracing::debug!("session ended with {} history entries", history.len());
    Ok(Outcome::Success)
}

fn print_history(history: &SessionHistory) {
    if history.is_empty() {
        println!("(no history)");
        return;
    }
    for (i, entry) in history.iter().enumerate() {
        println!("{}. {}", i + 1, entry.action);
        println!("   Input:");
        for line in entry.input.lines() {
            println!("     {line}");
        }
        println!("   Result:");
        for line in entry.result.lines() {
            println!("     {line}");
        }
    }
}
