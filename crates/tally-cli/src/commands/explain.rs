// crates/tally-cli/src/commands/explain.rs
//
// `tally explain <actor> [--epoch-end <timestamp>]` - show which events
// credited an actor and how each reward was formed.

use clap::Args;
use tally_core::identity::ActorId;

use crate::commands::load_engine;
use crate::config::TallyConfig;
use crate::output::{format_json, format_table, ExplainRow, OutputFormat};

/// Arguments for the explain command.
#[derive(Debug, Args)]
pub struct ExplainCmd {
    /// Actor identifier (e.g. a DID).
    pub actor: String,

    /// Only include events with a logical timestamp at or before this value.
    #[arg(long)]
    pub epoch_end: Option<u64>,
}

/// Run the explain command.
pub fn run(
    config: &TallyConfig,
    format: &OutputFormat,
    cmd: &ExplainCmd,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(config)?;
    let explanation = engine.explain(&ActorId::from(cmd.actor.as_str()), cmd.epoch_end)?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&explanation)),
        OutputFormat::Table => {
            match explanation.epoch_end {
                Some(end) => println!("{} through timestamp {}", explanation.actor, end),
                None => println!("{}", explanation.actor),
            }
            if explanation.entries.is_empty() {
                println!("No rewards.");
            } else {
                let rows: Vec<ExplainRow> =
                    explanation.entries.iter().map(ExplainRow::from).collect();
                println!("{}", format_table(&rows));
            }
            println!("Total: {} {}", explanation.total, explanation.currency);
        }
    }
    Ok(())
}
