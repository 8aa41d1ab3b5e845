// crates/tally-cli/src/commands/replay.rs
//
// `tally replay`: rebuild every account from the journal and summarize.

use crate::commands::load_engine;
use crate::config::TallyConfig;
use crate::output::{format_json, format_table, AccountRow, OutputFormat};

/// Run the replay command.
pub fn run(config: &TallyConfig, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(config)?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&engine.snapshot())),
        OutputFormat::Table => {
            let rows: Vec<AccountRow> = engine
                .balances()
                .actors()
                .iter()
                .map(|actor| {
                    AccountRow::new(&engine.get_balance(actor), engine.get_history(actor).len())
                })
                .collect();

            println!("Events applied: {}", engine.applied_count());
            println!("Last hash:      {}", engine.last_event_hash());
            println!(
                "Total supply:   {} {}",
                engine.balances().total_supply()?,
                engine.currency()
            );
            println!();
            if rows.is_empty() {
                println!("No accounts.");
            } else {
                println!("{}", format_table(&rows));
            }
        }
    }
    Ok(())
}
