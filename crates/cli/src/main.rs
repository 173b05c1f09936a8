//! Folio CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `folio.toml` (or `--config`) and validate it.
//! 2. **Wire observability**: configure `tracing-subscriber` with a text or
//!    JSON layer and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an
//!    OpenTelemetry OTLP exporter. All `tracing` spans and events emitted by
//!    every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: the secure fetcher (reqwest transport,
//!    system resolver, system clock) and the directory-backed asset store.
//! 4. **Dispatch** one sub-command.

mod commands;
mod config;
mod store;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::UrlVerdict;

/// Folio: resilience and coverage tooling for long-form generation.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to the TOML configuration file. Missing file means defaults.
    #[arg(long, global = true, default_value = "folio.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coverage tracker over a markdown document, section by section.
    Coverage {
        /// Markdown file; `##` headings delimit sections.
        markdown: PathBuf,

        /// Comma-separated required elements to check.
        #[arg(long)]
        require: Option<String>,

        /// Print the final coverage state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Download one image through the secure fetcher.
    Fetch {
        /// Image URL.
        url: String,

        /// Where to write the payload.
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Collect every image a markdown document references.
    Assets {
        /// Markdown file.
        markdown: PathBuf,

        /// Destination directory.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Check a URL against the request forgery rules without fetching it.
    /// Exits with status 2 when the URL is blocked.
    CheckUrl {
        /// URL to check.
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_json)?;
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Coverage {
            markdown,
            require,
            json,
        } => commands::coverage(&markdown, require.as_deref(), json, &cfg)?,
        Commands::Fetch { url, output } => commands::fetch(&url, &output, &cfg).await?,
        Commands::Assets { markdown, dir } => commands::assets(&markdown, &dir, &cfg).await?,
        Commands::CheckUrl { url } => match commands::check_url(&url, &cfg).await? {
            UrlVerdict::Allowed(url) => println!("allowed: {url}"),
            UrlVerdict::Blocked(reason) => {
                println!("blocked: {reason}");
                return Ok(ExitCode::from(2));
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}
