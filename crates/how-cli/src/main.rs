//! how - recall the shell commands you ran for similar questions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use how_cli::config::{self, Config};
use how_cli::logging::{self, LogConfig, LogFormat};
use how_cli::prompt::format_memory_context;
use how_core::{InteractionStore, OpContext};
use how_types::Interaction;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "how")]
#[command(about = "Remember shell commands by the questions that produced them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration directory (default: $HOW_CONFIG_DIR, then ~/.config/how)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Abort memory operations that run longer than this
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable verbose logging (store lifecycle, config writes)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging (every query)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    trace: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "memory=debug").
    /// Targets are prefixed with "how::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage command memory
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MemoryCommand {
    /// List remembered commands, newest first
    List {
        /// Maximum number to show (default: memory.list_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Find remembered commands related to a question
    Search {
        #[arg(required = true)]
        question: Vec<String>,
        /// Maximum number to show (default: memory.search_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Remember that a question led to a command
    Save {
        #[arg(long)]
        question: String,
        #[arg(long)]
        command: String,
        #[arg(long, default_value = "")]
        explanation: String,
    },
    /// Print the prompt block of commands recalled for a question
    Context {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Forget every remembered command
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the current configuration file
    Show,
    /// Create a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::config_dir()?,
    };
    let ctx = match cli.timeout {
        Some(secs) => OpContext::with_timeout(Duration::from_secs(secs)),
        None => OpContext::background(),
    };

    match cli.command {
        Command::Memory { action } => run_memory(action, &dir, &ctx),
        Command::Config { action } => run_config(action, &dir),
    }
}

fn run_memory(action: MemoryCommand, dir: &Path, ctx: &OpContext) -> Result<()> {
    let config = Config::load_from(dir)?;

    match action {
        MemoryCommand::List { limit, json } => {
            let store = open_store(dir, &config)?;
            let interactions = store.list(ctx, limit.unwrap_or(config.memory.list_limit))?;
            print_interactions(&interactions, json)?;
            store.close()?;
        }
        MemoryCommand::Search {
            question,
            limit,
            json,
        } => {
            let store = open_store(dir, &config)?;
            let limit = limit.unwrap_or(config.memory.search_limit);
            let interactions = store.search(ctx, &question.join(" "), limit)?;
            print_interactions(&interactions, json)?;
            store.close()?;
        }
        MemoryCommand::Save {
            question,
            command,
            explanation,
        } => {
            if !config.memory.enabled {
                tracing::info!(target: "how::cli", "Memory is disabled, not saving");
                return Ok(());
            }
            let store = open_store(dir, &config)?;
            store.save(ctx, &question, &command, &explanation)?;
            store.close()?;
        }
        MemoryCommand::Context { question } => {
            print!("{}", recall_context(&config, dir, ctx, &question.join(" ")));
        }
        MemoryCommand::Clear => {
            let store = open_store(dir, &config)?;
            let removed = store.clear(ctx)?;
            store.close()?;
            println!("Memory cleared ({} commands removed).", removed);
        }
    }
    Ok(())
}

fn run_config(action: ConfigCommand, dir: &Path) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            println!("{}", Config::show(dir)?);
        }
        ConfigCommand::Init { force } => {
            let path = dir.join(config::CONFIG_FILE_NAME);
            if path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            let path = Config::default().save_to(dir)?;
            println!("Default config created at {}", path.display());
        }
    }
    Ok(())
}

fn open_store(dir: &Path, config: &Config) -> Result<InteractionStore> {
    InteractionStore::open_with(dir, &config.memory.store_options())
        .with_context(|| format!("Failed to open memory in {}", dir.display()))
}

/// Recalled interactions as prompt text. Memory problems never fail the
/// caller; they are logged and yield no context.
fn recall_context(config: &Config, dir: &Path, ctx: &OpContext, question: &str) -> String {
    if !config.memory.enabled {
        tracing::info!(target: "how::cli", "Memory is disabled, no context");
        return String::new();
    }

    let store = match InteractionStore::open_with(dir, &config.memory.store_options()) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(target: "how::memory", "Memory unavailable: {}", e);
            return String::new();
        }
    };

    match store.search(ctx, question, config.memory.search_limit) {
        Ok(interactions) => format_memory_context(&interactions),
        Err(e) => {
            tracing::warn!(target: "how::memory", "Memory search failed: {}", e);
            String::new()
        }
    }
}

fn print_interactions(interactions: &[Interaction], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(interactions)?);
        return Ok(());
    }

    if interactions.is_empty() {
        println!("No remembered commands yet.");
        return Ok(());
    }

    for interaction in interactions {
        println!("  Q: {}", interaction.question);
        println!("  $ {}", interaction.command);
        if interaction.is_repeat() {
            println!("  (used {} times)", interaction.use_count);
        }
        println!();
    }
    Ok(())
}
