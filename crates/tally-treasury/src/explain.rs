// crates/tally-treasury/src/explain.rs
//
// "Explain this balance": re-derive, from an event log alone, which events
// credited an actor and how each reward was formed. Nothing is cached; the log
// is replayed through a scratch engine so that duplicates and chain rules are
// honoured exactly as they were when the balance was built.

use serde::Serialize;

use tally_core::amount::Amount;
use tally_core::event::{LedgerEvent, PolicyVersion};
use tally_core::identity::ActorId;

use crate::balance::DEFAULT_CURRENCY;
use crate::engine::{EngineError, EngineOutcome, TreasuryEngine};
use crate::policy::{PolicyTable, RewardBreakdown, RewardDecision};

/// One event that credited the explained actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationEntry {
    pub event_id: String,
    pub event_type: String,
    pub sequence_number: u64,
    pub timestamp: u64,
    pub policy_version: PolicyVersion,
    pub breakdown: RewardBreakdown,
    /// Actor balance after this entry.
    pub running_total: Amount,
}

/// Ordered derivation of an actor's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub actor: ActorId,
    /// Last logical timestamp included, if bounded.
    pub epoch_end: Option<u64>,
    pub entries: Vec<ExplanationEntry>,
    pub total: Amount,
    pub currency: String,
}

impl Explanation {
    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }
}

/// Explain `actor`'s balance from `events`, including only events whose
/// timestamp is at most `epoch_end` when one is given.
///
/// The log must be a valid chain from genesis; the first event the engine
/// would refuse is returned as the error.
pub fn explain(
    events: &[LedgerEvent],
    policies: &PolicyTable,
    actor: &ActorId,
    epoch_end: Option<u64>,
) -> Result<Explanation, EngineError> {
    let mut scratch = TreasuryEngine::new(policies.clone());
    let mut entries = Vec::new();
    let mut total = Amount::ZERO;

    for event in events {
        let outcome = scratch.process_ledger_event(event)?;
        let EngineOutcome::Applied { recipient, .. } = outcome else {
            continue;
        };
        if &recipient != actor || epoch_end.is_some_and(|end| event.timestamp > end) {
            continue;
        }

        let breakdown = match policies.reward_for(event) {
            Ok(RewardDecision::Reward { breakdown, .. }) => breakdown,
            Ok(RewardDecision::NoEffect) => continue,
            Err(source) => {
                return Err(EngineError::PolicyEvaluation {
                    event_id: event.event_id.clone(),
                    source,
                })
            }
        };
        total = total
            .checked_add(breakdown.total)
            .map_err(|source| EngineError::Arithmetic {
                event_id: event.event_id.clone(),
                source,
            })?;
        entries.push(ExplanationEntry {
            event_id: event.event_id.clone(),
            event_type: event.event_type().to_string(),
            sequence_number: event.sequence_number,
            timestamp: event.timestamp,
            policy_version: event.policy_version,
            breakdown,
            running_total: total,
        });
    }

    Ok(Explanation {
        actor: actor.clone(),
        epoch_end,
        entries,
        total,
        currency: DEFAULT_CURRENCY.to_string(),
    })
}
