// crates/tally-cli/src/commands/account.rs
//
// `tally balance <actor>` and `tally history <actor>`.

use tally_core::identity::ActorId;

use crate::commands::load_engine;
use crate::config::TallyConfig;
use crate::output::{format_json, format_table, AccountRow, HistoryRow, OutputFormat};

/// Print the balance of one actor.
pub fn balance(
    config: &TallyConfig,
    format: &OutputFormat,
    actor: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(config)?;
    let actor = ActorId::from(actor);
    let account = engine.get_balance(&actor);

    match format {
        OutputFormat::Json => println!("{}", format_json(&account)),
        OutputFormat::Table => {
            let transactions = engine.get_history(&actor).len();
            println!("{}", format_table(&[AccountRow::new(&account, transactions)]));
        }
    }
    Ok(())
}

/// Print the transaction history of one actor, oldest first.
pub fn history(
    config: &TallyConfig,
    format: &OutputFormat,
    actor: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = load_engine(config)?;
    let records = engine.get_history(&ActorId::from(actor));

    match format {
        OutputFormat::Json => println!("{}", format_json(&records)),
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No transactions for {}.", actor);
            } else {
                let rows: Vec<HistoryRow> = records.iter().map(HistoryRow::from).collect();
                println!("{}", format_table(&rows));
            }
        }
    }
    Ok(())
}
