//! Rehydrate CLI - inspect and manage persisted mutation logs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rehydrate_core::capture::{MutationLog, MutationRecorder};
use rehydrate_core::config::RuntimeConfig;
use rehydrate_core::embed;
use rehydrate_core::ids::IdGenerator;
use rehydrate_core::replay::ReplayEngine;
use rehydrate_core::storage::{FileStore, StorageKeys};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rehydrate")]
#[command(about = "Rehydrate mutation log tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to rehydrate.toml and REHYDRATE_* variables)
    #[arg(short, long, global = true, env = "REHYDRATE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate node identifiers
    Ids {
        /// Reproducible seed
        #[arg(long, conflicts_with_all = ["content", "ephemeral"])]
        seed: Option<u64>,

        /// Derive a reproducible seed from this content
        #[arg(long, conflicts_with = "ephemeral")]
        content: Option<String>,

        /// Seed from the operating system
        #[arg(long)]
        ephemeral: bool,

        /// Number of identifiers
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Identifier length (defaults to the configured length)
        #[arg(short, long)]
        length: Option<usize>,
    },
    /// Persisted log commands
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Embed a log file into an HTML document
    Embed {
        /// HTML document
        html: PathBuf,

        /// JSON mutation log
        log: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract the embedded log from an HTML document
    Extract {
        /// HTML document
        html: PathBuf,

        /// Write the document without the log element here
        #[arg(long)]
        strip: Option<PathBuf>,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum LogCommands {
    /// Print the persisted log and cursor of a root
    Show {
        /// Root name
        #[arg(short, long, default_value = "app")]
        root: String,
    },
    /// Empty the persisted log of a root and reset its cursor
    Clear {
        /// Root name
        #[arg(short, long, default_value = "app")]
        root: String,
    },
    /// Validate a JSON mutation log file
    Check {
        /// Log file
        path: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("rehydrate {}", env!("CARGO_PKG_VERSION"));
            println!("rehydrate-core {}", rehydrate_core::VERSION);
        }
        Commands::Ids {
            seed,
            content,
            ephemeral,
            count,
            length,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let generator = if ephemeral {
                IdGenerator::ephemeral()?
            } else if let Some(content) = content {
                IdGenerator::from_content(content.as_bytes())
            } else {
                IdGenerator::reproducible(seed.or(config.ids.seed).unwrap_or_default())
            };
            let mut generator = generator.with_length(length.unwrap_or(config.ids.length));
            for _ in 0..count {
                println!("{}", generator.next_id());
            }
            tracing::debug!(state = ?generator.state(), "Generator position");
        }
        Commands::Log { command } => {
            let config = load_config(cli.config.as_ref())?;
            let store = FileStore::new(&config.storage.data_dir);
            match command {
                LogCommands::Show { root } => {
                    let engine = ReplayEngine::new(config.replay.clone(), StorageKeys::for_root(&root));
                    let log = engine
                        .load_log(&store, config.capture.limit)
                        .await?
                        .unwrap_or_default();
                    let cursor = engine.load_cursor(&store).await?;
                    println!("root:    {}", root);
                    println!("records: {}", log.len());
                    println!("cursor:  {}", cursor);
                    for (index, record) in log.iter().enumerate() {
                        let marker = if index < cursor { "applied" } else { "pending" };
                        println!("  [{index}] {marker} {}", serde_json::to_string(record)?);
                    }
                }
                LogCommands::Clear { root } => {
                    let mut recorder =
                        MutationRecorder::new(config.capture.clone(), StorageKeys::for_root(&root));
                    let mut log = MutationLog::with_limit(config.capture.limit);
                    recorder.clear(&mut log, &store).await?;
                    println!("Cleared log for root: {}", root);
                }
                LogCommands::Check { path } => {
                    let blob = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("reading {}", path.display()))?;
                    let log = MutationLog::from_json(&blob, config.capture.limit)
                        .with_context(|| format!("invalid log {}", path.display()))?;
                    println!("{}: {} records, ok", path.display(), log.len());
                }
            }
        }
        Commands::Embed { html, log, output } => {
            let document = tokio::fs::read_to_string(&html)
                .await
                .with_context(|| format!("reading {}", html.display()))?;
            let blob = tokio::fs::read_to_string(&log)
                .await
                .with_context(|| format!("reading {}", log.display()))?;
            let config = load_config(cli.config.as_ref())?;
            let log = MutationLog::from_json(&blob, config.capture.limit)
                .with_context(|| format!("invalid log {}", log.display()))?;

            let rendered = embed::inject(&document, &log)?;
            match output {
                Some(path) => tokio::fs::write(&path, rendered).await?,
                None => print!("{}", rendered),
            }
        }
        Commands::Extract { html, strip } => {
            let document = tokio::fs::read_to_string(&html)
                .await
                .with_context(|| format!("reading {}", html.display()))?;
            let (payload, rest) = embed::extract(&document)
                .with_context(|| format!("no embedded log in {}", html.display()))?;
            println!("{}", payload);
            if let Some(path) = strip {
                tokio::fs::write(&path, rest).await?;
            }
        }
    }

    Ok(())
}
