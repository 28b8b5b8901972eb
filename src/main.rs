//! Dredge: MineRL trajectory extraction and chain visualization
//!
//! Provides subcommands:
//!
//! - `list`     -- List the episodes under the dataset root
//! - `inspect`  -- Load one episode and print its summary as JSON
//! - `chain`    -- Render a crafting chain with Graphviz
//! - `schema`   -- Print the observation and action keys of a task schema

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dredge::chain::ChainRenderer;
use dredge::config::DredgeConfig;
use dredge::trajectory::{trajectory_names, TrajectoryLoader};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Dredge: MineRL trajectory extraction and chain visualization
#[derive(Parser)]
#[command(name = "dredge", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the episode directories under the dataset root.
    List {
        /// Dataset root (overrides `dataset.root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Load one episode and print its summary.
    Inspect {
        /// Episode directory name under the dataset root, or a path.
        episode: PathBuf,

        /// Skip decoding the video recording.
        #[arg(long)]
        no_video: bool,

        /// Top-level keys to leave out (repeatable).
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },

    /// Render a crafting chain to an image.
    Chain {
        /// Chain tokens in order, e.g. `log craft:planks:3 planks`.
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Output file name without extension.
        #[arg(long, default_value = "out")]
        name: String,

        /// Output format (overrides `chain.format`).
        #[arg(long)]
        format: Option<String>,
    },

    /// Print the keys of a task schema.
    Schema {
        /// Task id (overrides `dataset.task_id`).
        #[arg(long)]
        task: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = DredgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List { root } => {
            if let Some(root) = root {
                config.dataset.root = root;
            }
            cmd_list(&config)
        }
        Commands::Inspect {
            episode,
            no_video,
            ignore,
        } => cmd_inspect(&config, &episode, no_video, ignore),
        Commands::Chain {
            tokens,
            name,
            format,
        } => {
            if let Some(format) = format {
                config.chain.format = format;
            }
            cmd_chain(&config, &tokens, &name)
        }
        Commands::Schema { task } => {
            if let Some(task) = task {
                config.dataset.task_id = task;
            }
            cmd_schema(&config)
        }
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_list(config: &DredgeConfig) -> Result<()> {
    let root = &config.dataset.root;
    let names = trajectory_names(root, &config.dataset.layout)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    tracing::info!(root = %root.display(), episodes = names.len(), "Scanned dataset");
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_inspect(
    config: &DredgeConfig,
    episode: &Path,
    no_video: bool,
    ignore: Vec<String>,
) -> Result<()> {
    let loader = TrajectoryLoader::from_config(config)
        .with_context(|| format!("Failed to select schema for {}", config.dataset.task_id))?;

    let dir = if episode.is_dir() {
        episode.to_path_buf()
    } else {
        config.dataset.root.join(episode)
    };
    let mut ignore: BTreeSet<String> = ignore.into_iter().collect();
    if no_video {
        ignore.insert(config.dataset.layout.video_key.clone());
    }

    let record = loader
        .load_data(&dir, &ignore)
        .with_context(|| format!("Failed to load episode {}", dir.display()))?;
    let summary = serde_json::to_string_pretty(&record.summary())?;
    println!("{summary}");
    Ok(())
}

fn cmd_chain(config: &DredgeConfig, tokens: &[String], name: &str) -> Result<()> {
    let renderer = ChainRenderer::from_config(&config.chain);
    let path = renderer.save_chain(tokens, name, &config.chain.format)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_schema(config: &DredgeConfig) -> Result<()> {
    let loader = TrajectoryLoader::from_config(config)
        .with_context(|| format!("Failed to select schema for {}", config.dataset.task_id))?;
    let schema = loader.schema();

    println!("Task: {}", config.dataset.task_id);
    println!("Observation:");
    for path in schema.observation.leaf_paths() {
        println!("  {path}");
    }
    println!("Action:");
    for path in schema.action.leaf_paths() {
        println!("  {path}");
    }
    Ok(())
}
