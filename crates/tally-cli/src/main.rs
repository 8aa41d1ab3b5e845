// crates/tally-cli/src/main.rs
//
// CLI entrypoint for the Tally treasury tools.
//
// Every command rebuilds the treasury by replaying the event journal from
// genesis, then answers from the derived state. The journal is the only
// persisted state.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use commands::append::AppendCmd;
use commands::explain::ExplainCmd;
use config::TallyConfig;

/// Tally: deterministic, ledger-driven treasury.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = "0.1.0",
    about = "Replay a hash-chained event journal into balances and reward history"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "~/.tally/config.toml")]
    config: String,

    /// Journal path, overriding the configuration file.
    #[arg(long, global = true)]
    journal: Option<String>,

    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay the journal and summarize every account.
    Replay,

    /// Show an actor's balance.
    Balance {
        /// Actor identifier (e.g. a DID).
        actor: String,
    },

    /// Show an actor's transaction history, oldest first.
    History {
        /// Actor identifier (e.g. a DID).
        actor: String,
    },

    /// Explain how an actor's balance was derived.
    Explain(ExplainCmd),

    /// Check the journal's hash chain and sequence without printing balances.
    Verify,

    /// Append a new event to the journal, chained onto the last one.
    #[command(subcommand)]
    Append(AppendCmd),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let config_result = TallyConfig::load(&cli.config);
    let mut config = match &config_result {
        Ok(cfg) => cfg.clone(),
        Err(_) => TallyConfig::default(),
    };
    if let Some(journal) = &cli.journal {
        config.journal_path = journal.clone();
    }

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match &config_result {
        Ok(_) => tracing::info!("Loaded configuration from {}", cli.config),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            cli.config,
            e
        ),
    }

    let format = if cli.json {
        output::OutputFormat::Json
    } else {
        output::OutputFormat::Table
    };

    match &cli.command {
        Commands::Replay => commands::replay::run(&config, &format)?,
        Commands::Balance { actor } => commands::account::balance(&config, &format, actor)?,
        Commands::History { actor } => commands::account::history(&config, &format, actor)?,
        Commands::Explain(cmd) => commands::explain::run(&config, &format, cmd)?,
        Commands::Verify => commands::verify::run(&config)?,
        Commands::Append(cmd) => commands::append::run(&config, &format, cmd)?,
    }

    Ok(())
}
