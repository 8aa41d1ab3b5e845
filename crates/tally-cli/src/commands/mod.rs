// crates/tally-cli/src/commands/mod.rs
//
// Command module declarations for the Tally CLI, plus the shared step every
// command starts from: rebuilding the treasury from the journal.

pub mod account;
pub mod append;
pub mod explain;
pub mod replay;
pub mod verify;

use tally_treasury::{read_journal, RequireSignature, TreasuryEngine};

use crate::config::TallyConfig;

/// An empty engine configured from `config`.
pub fn build_engine(config: &TallyConfig) -> Result<TreasuryEngine, Box<dyn std::error::Error>> {
    let engine = TreasuryEngine::new(config.policy_table()?).with_currency(config.currency.clone());
    Ok(if config.require_signature {
        engine.with_gate(RequireSignature)
    } else {
        engine
    })
}

/// Replay the configured journal from genesis.
pub fn load_engine(config: &TallyConfig) -> Result<TreasuryEngine, Box<dyn std::error::Error>> {
    let journal_path = config.journal_path();
    let events = read_journal(&journal_path)?;
    let mut engine = build_engine(config)?;
    engine.process_batch(&events)?;
    tracing::info!(
        "Replayed {} events from {} ({} applied)",
        events.len(),
        journal_path,
        engine.applied_count()
    );
    Ok(engine)
}
