//! Operator checks for the Cartomantes Online service worker.
//!
//! Provides commands for:
//! - Precaching the app shell against a live deployment
//! - Previewing the notification a payload turns into
//! - Printing the effective worker configuration
//!
//! ## Usage
//!
//! ```bash
//! # Check that every app-shell entry of a deployment can be cached
//! sw-check precache --config sw.json --scope https://cartomantes.github.io/app/
//!
//! # Preview a push payload
//! sw-check preview --config sw.json --push payload.json
//!
//! # Print the configuration after defaults and environment overrides
//! sw-check show-config --config sw.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use cartomantes_common::{try_init_logging, LogConfig, LogFormat};
use clap::{Parser, Subcommand};
use url::Url;

mod check;

#[derive(Parser)]
#[command(name = "sw-check")]
#[command(about = "Operator checks for the Cartomantes Online service worker")]
struct Cli {
    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Log filter directives, e.g. `cartomantes_sw=debug`
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the install step against the network and report what was cached
    Precache {
        /// Worker configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Override the registration scope
        #[arg(long)]
        scope: Option<Url>,
    },

    /// Show the notification a payload produces
    Preview {
        /// Worker configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Raw push message data
        #[arg(long, conflicts_with = "message")]
        push: Option<PathBuf>,
        /// Page message (JSON), e.g. a `LOCAL_NOTIFY`
        #[arg(long)]
        message: Option<PathBuf>,
        /// Cloud-messaging background payload (JSON)
        #[arg(long, conflicts_with_all = ["push", "message"])]
        background: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig {
        /// Worker configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::default().with_format(cli.log_format);
    if let Some(filter) = cli.log {
        log_config = log_config.with_filter(filter);
    }
    // Only fails when a subscriber is already set.
    let _ = try_init_logging(&log_config);

    match cli.command {
        Commands::Precache { config, scope } => {
            let mut config = check::load_config(&config)?;
            if let Some(scope) = scope {
                config = check::with_scope(config, scope)?;
            }
            let report = check::precache(config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.failed.is_empty() {
                std::process::exit(1);
            }
        }

        Commands::Preview {
            config,
            push,
            message,
            background,
        } => {
            let config = check::load_config(&config)?;
            let payload = match (push, message, background) {
                (Some(path), _, _) => check::Payload::Push(Some(read(&path)?)),
                (_, Some(path), _) => check::Payload::Message(read_json(&path)?),
                (_, _, Some(path)) => check::Payload::Background(read_json(&path)?),
                (None, None, None) => check::Payload::Push(None),
            };
            let preview = check::preview(config, payload).await?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }

        Commands::ShowConfig { config } => {
            let config = check::load_config(&config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let data = read(path)?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}
