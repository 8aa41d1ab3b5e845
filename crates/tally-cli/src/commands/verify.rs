// crates/tally-cli/src/commands/verify.rs
//
// `tally verify` - walk the journal's hash chain and report the first event
// the engine would refuse.

use tally_treasury::{read_journal, BatchError};

use crate::commands::build_engine;
use crate::config::TallyConfig;

/// Run the verify command.
pub fn run(config: &TallyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let events = read_journal(config.journal_path())?;
    let mut engine = build_engine(config)?;

    match engine.process_batch(&events) {
        Ok(_) => {
            println!("Journal OK");
            println!("  Events:        {}", events.len());
            println!("  Applied:       {}", engine.applied_count());
            println!("  Last hash:     {}", engine.last_event_hash());
            println!("  Next sequence: {}", engine.next_sequence());
            Ok(())
        }
        Err(e) => {
            println!("{}", failure_report(&e));
            Err(e.into())
        }
    }
}

/// Blank journal lines are skipped on read, so the failing event is reported
/// by its 1-based position among events, not by file line.
fn failure_report(err: &BatchError) -> String {
    format!(
        "Journal INVALID\n  Event #: {}\n  Id:      {}\n  Kind:    {}\n  Error:   {}",
        err.index + 1,
        err.error.event_id(),
        err.error.kind(),
        err.error
    )
}
