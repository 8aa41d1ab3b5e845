// crates/tally-treasury/src/engine.rs
//
// Treasury engine: turns a hash-chained event stream into balances.
//
// Per-event states:
//   Received -> ChainValidated -> (Duplicate | New) -> (RuleApplied | NoOp) -> Persisted
//
// Every check (gate, self-hash, dedup, linkage, sequence, policy evaluation,
// balance arithmetic) runs before the first mutation, so an error leaves the
// engine exactly as it was. A verbatim replay of an already-applied event is
// recognized before linkage is checked and reported as `Duplicate`.
//
// The engine is single-writer: `process_ledger_event` takes `&mut self`.
// Share it across threads through `SharedTreasury`.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::amount::Amount;
use tally_core::error::ArithmeticError;
use tally_core::event::{EventHash, LedgerEvent, GENESIS_HASH};
use tally_core::identity::ActorId;
use tally_core::traits::EventGate;

use crate::balance::{BalanceStore, TokenAccount, TransactionRecord, DEFAULT_CURRENCY};
use crate::dedup::DedupLedger;
use crate::explain::{self, Explanation};
use crate::gate::AcceptAll;
use crate::policy::{PolicyError, PolicyTable, RewardDecision};

/// What processing an event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EngineOutcome {
    /// Already applied; nothing changed.
    Duplicate,
    /// Credited `amount` to `recipient`.
    Applied { recipient: ActorId, amount: Amount },
    /// Accepted with no monetary effect.
    NoOp,
}

/// Why an event was refused. State is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `previous_event_hash` does not match the last accepted event.
    #[error("Chain break at event {event_id}: expected previous hash {expected}, found {found}")]
    ChainBreak {
        event_id: String,
        expected: EventHash,
        found: EventHash,
    },

    /// Sequence number is not the next expected one.
    #[error("Event {event_id} out of sequence: expected {expected}, found {found}")]
    OutOfSequence {
        event_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Sequence numbers exhausted at event {event_id}")]
    SequenceExhausted { event_id: String },

    /// Declared `event_hash` does not match the event content.
    #[error("Event {event_id} hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch {
        event_id: String,
        declared: EventHash,
        computed: EventHash,
    },

    /// The id was applied before under a different hash.
    #[error("Event {event_id} was already applied with different content")]
    ConflictingReplay { event_id: String },

    /// Refused by the configured gate.
    #[error("Event {event_id} rejected: {reason}")]
    Rejected { event_id: String, reason: String },

    #[error("Policy evaluation failed for event {event_id}: {source}")]
    PolicyEvaluation {
        event_id: String,
        source: PolicyError,
    },

    /// Balance update overflowed.
    #[error("Arithmetic error applying event {event_id}: {source}")]
    Arithmetic {
        event_id: String,
        source: ArithmeticError,
    },

    #[error("Event {event_id} could not be encoded: {message}")]
    Encoding { event_id: String, message: String },
}

impl EngineError {
    /// Stable label for audit logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ChainBreak { .. } => "chain_break",
            EngineError::OutOfSequence { .. } => "out_of_sequence",
            EngineError::SequenceExhausted { .. } => "sequence_exhausted",
            EngineError::HashMismatch { .. } => "hash_mismatch",
            EngineError::ConflictingReplay { .. } => "conflicting_replay",
            EngineError::Rejected { .. } => "rejected",
            EngineError::PolicyEvaluation { .. } => "policy_evaluation",
            EngineError::Arithmetic { .. } => "arithmetic",
            EngineError::Encoding { .. } => "encoding",
        }
    }

    /// The offending event.
    pub fn event_id(&self) -> &str {
        match self {
            EngineError::ChainBreak { event_id, .. }
            | EngineError::OutOfSequence { event_id, .. }
            | EngineError::SequenceExhausted { event_id }
            | EngineError::HashMismatch { event_id, .. }
            | EngineError::ConflictingReplay { event_id }
            | EngineError::Rejected { event_id, .. }
            | EngineError::PolicyEvaluation { event_id, .. }
            | EngineError::Arithmetic { event_id, .. }
            | EngineError::Encoding { event_id, .. } => event_id,
        }
    }
}

/// A batch stopped at the event at `index`; earlier events were applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Batch stopped at index {index}: {error}")]
pub struct BatchError {
    pub index: usize,
    pub error: EngineError,
}

/// One actor's derived state inside an `EngineSnapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub account: TokenAccount,
    pub history: Vec<TransactionRecord>,
}

/// Complete derived state, in a deterministic order.
///
/// Two engines fed the same event sequence produce byte-identical
/// serializations of their snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub accounts: Vec<AccountSnapshot>,
    pub applied_event_ids: Vec<String>,
    pub last_event_hash: EventHash,
    pub next_sequence: u64,
}

/// The treasury for one ledger.
pub struct TreasuryEngine {
    policies: PolicyTable,
    gate: Box<dyn EventGate>,
    balances: BalanceStore,
    dedup: DedupLedger,
    last_hash: EventHash,
    next_sequence: u64,
    log: Vec<LedgerEvent>,
}

impl TreasuryEngine {
    /// Create an empty engine at genesis, admitting every event.
    pub fn new(policies: PolicyTable) -> Self {
        Self {
            policies,
            gate: Box::new(AcceptAll),
            balances: BalanceStore::new(DEFAULT_CURRENCY),
            dedup: DedupLedger::new(),
            last_hash: GENESIS_HASH,
            next_sequence: 0,
            log: Vec::new(),
        }
    }

    /// Denominate balances in `currency`. Call before processing events.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.balances = BalanceStore::new(currency);
        self
    }

    /// Admit events through `gate`.
    pub fn with_gate(mut self, gate: impl EventGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Rebuild an engine from genesis by replaying `events` in order.
    pub fn replay(policies: PolicyTable, events: &[LedgerEvent]) -> Result<Self, BatchError> {
        let mut engine = Self::new(policies);
        engine.process_batch(events)?;
        Ok(engine)
    }

    /// Apply one event.
    pub fn process_ledger_event(&mut self, event: &LedgerEvent) -> Result<EngineOutcome, EngineError> {
        let event_id = event.event_id.as_str();

        // Received
        if let Err(reason) = self.gate.check(event) {
            warn!(event_id, %reason, "Event rejected by gate");
            return Err(EngineError::Rejected {
                event_id: event_id.to_string(),
                reason,
            });
        }
        let computed = event.compute_hash().map_err(|e| EngineError::Encoding {
            event_id: event_id.to_string(),
            message: e.to_string(),
        })?;
        if computed != event.event_hash {
            warn!(event_id, "Event hash does not match its content");
            return Err(EngineError::HashMismatch {
                event_id: event_id.to_string(),
                declared: event.event_hash,
                computed,
            });
        }

        // Duplicate
        if let Some(applied) = self.dedup.applied_hash(event_id) {
            if *applied == event.event_hash {
                debug!(event_id, "Duplicate event ignored");
                return Ok(EngineOutcome::Duplicate);
            }
            warn!(event_id, "Event id reused with different content");
            return Err(EngineError::ConflictingReplay {
                event_id: event_id.to_string(),
            });
        }

        // ChainValidated
        if event.previous_event_hash != self.last_hash {
            warn!(
                event_id,
                expected = %self.last_hash,
                found = %event.previous_event_hash,
                "Chain break"
            );
            return Err(EngineError::ChainBreak {
                event_id: event_id.to_string(),
                expected: self.last_hash,
                found: event.previous_event_hash,
            });
        }
        if event.sequence_number != self.next_sequence {
            warn!(
                event_id,
                expected = self.next_sequence,
                found = event.sequence_number,
                "Event out of sequence"
            );
            return Err(EngineError::OutOfSequence {
                event_id: event_id.to_string(),
                expected: self.next_sequence,
                found: event.sequence_number,
            });
        }
        let next_sequence = event
            .sequence_number
            .checked_add(1)
            .ok_or_else(|| EngineError::SequenceExhausted {
                event_id: event_id.to_string(),
            })?;

        // New: evaluate the pinned rules.
        let decision = self
            .policies
            .reward_for(event)
            .map_err(|source| EngineError::PolicyEvaluation {
                event_id: event_id.to_string(),
                source,
            })?;

        // RuleApplied | NoOp. apply_delta is the only fallible mutation and
        // changes nothing when it fails.
        let outcome = match decision {
            RewardDecision::Reward {
                recipient, amount, ..
            } => {
                let record = TransactionRecord::for_event(event, amount);
                let balance = self
                    .balances
                    .apply_delta(&recipient, amount, record)
                    .map_err(|source| EngineError::Arithmetic {
                        event_id: event_id.to_string(),
                        source,
                    })?;
                debug!(event_id, %recipient, %amount, %balance, "Reward applied");
                EngineOutcome::Applied { recipient, amount }
            }
            RewardDecision::NoEffect => {
                debug!(event_id, event_type = event.event_type(), "No monetary effect");
                EngineOutcome::NoOp
            }
        };

        // Persisted
        self.balances.open_account(&event.actor);
        self.dedup.mark_applied(event_id, event.event_hash);
        self.last_hash = event.event_hash;
        self.next_sequence = next_sequence;
        self.log.push(event.clone());

        Ok(outcome)
    }

    /// Apply events in order, stopping at the first error.
    pub fn process_batch(&mut self, events: &[LedgerEvent]) -> Result<Vec<EngineOutcome>, BatchError> {
        let mut outcomes = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            let outcome = self
                .process_ledger_event(event)
                .map_err(|error| BatchError { index, error })?;
            outcomes.push(outcome);
        }
        info!(
            events = events.len(),
            applied = self.dedup.len(),
            "Processed event batch"
        );
        Ok(outcomes)
    }

    /// Current account for `actor` (zero balance if unseen).
    pub fn get_balance(&self, actor: &ActorId) -> TokenAccount {
        self.balances.get_balance(actor)
    }

    /// `actor`'s transaction records, oldest first.
    pub fn get_history(&self, actor: &ActorId) -> Vec<TransactionRecord> {
        self.balances.get_history(actor)
    }

    /// Re-derive how `actor`'s balance was formed from the accepted log.
    pub fn explain(&self, actor: &ActorId, epoch_end: Option<u64>) -> Result<Explanation, EngineError> {
        explain::explain(&self.log, &self.policies, actor, epoch_end)
            .map(|explanation| explanation.with_currency(self.balances.currency()))
    }

    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn currency(&self) -> &str {
        self.balances.currency()
    }

    /// Hash of the last accepted event (`GENESIS_HASH` when empty).
    pub fn last_event_hash(&self) -> EventHash {
        self.last_hash
    }

    /// Sequence number the next event must carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn applied_count(&self) -> usize {
        self.dedup.len()
    }

    /// Accepted events in application order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.log
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let accounts = self
            .balances
            .actors()
            .into_iter()
            .map(|actor| AccountSnapshot {
                history: self.balances.get_history(&actor),
                account: self.balances.get_balance(&actor),
            })
            .collect();
        EngineSnapshot {
            accounts,
            applied_event_ids: self.dedup.event_ids().map(str::to_string).collect(),
            last_event_hash: self.last_hash,
            next_sequence: self.next_sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::RequireSignature;
    use tally_core::event::{EventBuilder, EventPayload};

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn alice() -> ActorId {
        ActorId::from("did:example:alice")
    }

    fn bob() -> ActorId {
        ActorId::from("did:example:bob")
    }

    fn evt_1() -> LedgerEvent {
        EventBuilder::new("evt_1", alice(), EventPayload::content_created("0.8"))
            .timestamp(100)
            .build()
            .unwrap()
    }

    fn evt_2(previous: &LedgerEvent) -> LedgerEvent {
        EventBuilder::new("evt_2", bob(), EventPayload::interaction("like"))
            .follows(previous)
            .timestamp(200)
            .build()
            .unwrap()
    }

    fn engine() -> TreasuryEngine {
        TreasuryEngine::new(PolicyTable::builtin())
    }

    #[test]
    fn test_content_created_credits_actor() {
        let mut engine = engine();
        let outcome = engine.process_ledger_event(&evt_1()).unwrap();
        assert_eq!(
            outcome,
            EngineOutcome::Applied {
                recipient: alice(),
                amount: amt("8"),
            }
        );
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
        let history = engine.get_history(&alice());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "tx:evt_1");
        assert_eq!(history[0].reason, "ContentCreated");
        assert_eq!(history[0].timestamp, 100);
    }

    #[test]
    fn test_replay_is_silent_duplicate() {
        let mut engine = engine();
        let first = evt_1();
        engine.process_ledger_event(&first).unwrap();
        let outcome = engine.process_ledger_event(&first).unwrap();
        assert_eq!(outcome, EngineOutcome::Duplicate);
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
        assert_eq!(engine.get_history(&alice()).len(), 1);
        assert_eq!(engine.applied_count(), 1);
    }

    #[test]
    fn test_old_event_replayed_after_chain_moved_on() {
        let mut engine = engine();
        let first = evt_1();
        let second = evt_2(&first);
        engine.process_ledger_event(&first).unwrap();
        engine.process_ledger_event(&second).unwrap();
        assert_eq!(
            engine.process_ledger_event(&first).unwrap(),
            EngineOutcome::Duplicate
        );
        assert_eq!(engine.last_event_hash(), second.event_hash);
        assert_eq!(engine.next_sequence(), 2);
    }

    #[test]
    fn test_chain_break_mutates_nothing() {
        let mut engine = engine();
        let first = evt_1();
        engine.process_ledger_event(&first).unwrap();
        let before = engine.snapshot();

        let orphan = EventBuilder::new("evt_x", bob(), EventPayload::interaction("like"))
            .previous_hash(EventHash([9u8; 32]))
            .sequence(1)
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&orphan).unwrap_err();
        assert_eq!(err.kind(), "chain_break");
        assert_eq!(err.event_id(), "evt_x");
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.get_balance(&bob()).balance, Amount::ZERO);
    }

    #[test]
    fn test_out_of_sequence_rejected() {
        let mut engine = engine();
        let first = evt_1();
        engine.process_ledger_event(&first).unwrap();
        let skipped = EventBuilder::new("evt_2", bob(), EventPayload::interaction("like"))
            .previous_hash(first.event_hash)
            .sequence(5)
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&skipped).unwrap_err();
        assert_eq!(
            err,
            EngineError::OutOfSequence {
                event_id: "evt_2".to_string(),
                expected: 1,
                found: 5,
            }
        );
        assert_eq!(engine.applied_count(), 1);
    }

    #[test]
    fn test_tampered_event_rejected() {
        let mut engine = engine();
        let mut forged = evt_1();
        forged.payload = EventPayload::content_created("1");
        let err = engine.process_ledger_event(&forged).unwrap_err();
        assert_eq!(err.kind(), "hash_mismatch");
        assert_eq!(engine.get_balance(&alice()).balance, Amount::ZERO);
        assert_eq!(engine.last_event_hash(), GENESIS_HASH);
    }

    #[test]
    fn test_conflicting_replay_rejected() {
        let mut engine = engine();
        engine.process_ledger_event(&evt_1()).unwrap();
        let reused = EventBuilder::new("evt_1", alice(), EventPayload::content_created("1"))
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&reused).unwrap_err();
        assert_eq!(
            err,
            EngineError::ConflictingReplay {
                event_id: "evt_1".to_string()
            }
        );
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
    }

    #[test]
    fn test_policy_error_mutates_nothing() {
        let mut engine = engine();
        let bad = EventBuilder::new("evt_1", alice(), EventPayload::content_created("n/a"))
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&bad).unwrap_err();
        assert_eq!(err.kind(), "policy_evaluation");
        assert_eq!(engine.applied_count(), 0);
        assert_eq!(engine.last_event_hash(), GENESIS_HASH);
        assert!(engine.balances().actors().is_empty());

        // The same position in the chain is still open for a valid event.
        engine.process_ledger_event(&evt_1()).unwrap();
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
    }

    #[test]
    fn test_unknown_type_is_noop_but_advances_chain() {
        let mut engine = engine();
        let thread = EventBuilder::new("evt_t", alice(), EventPayload::unrecognized("ThreadUpdated"))
            .build()
            .unwrap();
        assert_eq!(engine.process_ledger_event(&thread).unwrap(), EngineOutcome::NoOp);
        assert_eq!(engine.last_event_hash(), thread.event_hash);
        assert_eq!(engine.next_sequence(), 1);
        assert!(engine.get_history(&alice()).is_empty());
        assert_eq!(engine.balances().actors(), vec![alice()]);
        assert_eq!(
            engine.process_ledger_event(&thread).unwrap(),
            EngineOutcome::Duplicate
        );
    }

    #[test]
    fn test_gate_rejection() {
        let mut engine = engine().with_gate(RequireSignature);
        let err = engine.process_ledger_event(&evt_1()).unwrap_err();
        assert_eq!(err.kind(), "rejected");

        let signed = EventBuilder::new("evt_1", alice(), EventPayload::content_created("0.8"))
            .signed("c2ln", "did:example:alice")
            .build()
            .unwrap();
        assert!(engine.process_ledger_event(&signed).is_ok());
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let mut engine = engine();
        let first = evt_1();
        let second = evt_2(&first);
        let err = engine
            .process_batch(&[first.clone(), first.clone(), evt_2(&second)])
            .unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.error.kind(), "chain_break");
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
    }

    #[test]
    fn test_currency_is_configurable() {
        let engine = engine().with_currency("TKN");
        assert_eq!(engine.get_balance(&alice()).currency, "TKN");
        assert_eq!(engine.currency(), "TKN");
    }

    #[test]
    fn test_sequence_exhausted_mutates_nothing() {
        let mut engine = engine();
        engine.next_sequence = u64::MAX;
        let before = engine.snapshot();

        let last = EventBuilder::new("evt_max", alice(), EventPayload::content_created("0.8"))
            .sequence(u64::MAX)
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&last).unwrap_err();
        assert_eq!(
            err,
            EngineError::SequenceExhausted {
                event_id: "evt_max".to_string()
            }
        );
        assert_eq!(err.kind(), "sequence_exhausted");
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.get_balance(&alice()).balance, Amount::ZERO);
    }

    #[test]
    fn test_balance_overflow_mutates_nothing() {
        let mut engine = engine();
        let max = Amount::from_micros(i64::MAX);
        let fill = EventBuilder::new(
            "evt_1",
            bob(),
            EventPayload::reward_allocated("did:example:alice", &max.to_string()),
        )
        .build()
        .unwrap();
        engine.process_ledger_event(&fill).unwrap();
        assert_eq!(engine.get_balance(&alice()).balance, max);
        let before = engine.snapshot();

        let one_more = EventBuilder::new("evt_2", alice(), EventPayload::content_created("0.1"))
            .follows(&fill)
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&one_more).unwrap_err();
        assert_eq!(
            err,
            EngineError::Arithmetic {
                event_id: "evt_2".to_string(),
                source: ArithmeticError::Overflow,
            }
        );
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.get_history(&alice()).len(), 1);
        assert_eq!(engine.next_sequence(), 1);
    }

    #[test]
    fn test_zero_coherence_is_noop_without_history() {
        let mut engine = engine();
        let zero = EventBuilder::new("evt_1", alice(), EventPayload::content_created("0"))
            .build()
            .unwrap();
        assert_eq!(engine.process_ledger_event(&zero).unwrap(), EngineOutcome::NoOp);
        assert!(engine.get_history(&alice()).is_empty());
        assert_eq!(engine.get_balance(&alice()).balance, Amount::ZERO);
        assert_eq!(engine.last_event_hash(), zero.event_hash);
        assert_eq!(engine.applied_count(), 1);
    }

    #[test]
    fn test_structured_score_is_a_policy_error() {
        let mut wire = serde_json::to_value(evt_1()).unwrap();
        wire["outcome"]["coherenceScore"] = serde_json::json!({ "value": 0.8 });
        let mut event: LedgerEvent = serde_json::from_value(wire).unwrap();
        event.seal().unwrap();

        let mut engine = engine();
        let err = engine.process_ledger_event(&event).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PolicyEvaluation {
                source: PolicyError::MalformedNumber {
                    field: "coherence_score",
                    ..
                },
                ..
            }
        ));
        assert_eq!(engine.applied_count(), 0);
        assert!(engine.balances().actors().is_empty());
    }

    #[test]
    fn test_negative_rate_never_debits() {
        let mut policies = PolicyTable::builtin();
        let mut v2 = crate::policy::RuleSet::v1();
        v2.version = tally_core::event::PolicyVersion(2);
        v2.interaction_rewards.insert("like".to_string(), amt("-0.5"));
        assert!(policies.register(v2).is_err());

        let mut engine = TreasuryEngine::new(policies);
        let first = evt_1();
        engine.process_ledger_event(&first).unwrap();
        let like = EventBuilder::new("evt_2", alice(), EventPayload::interaction("like"))
            .follows(&first)
            .policy_version(tally_core::event::PolicyVersion(2))
            .build()
            .unwrap();
        let err = engine.process_ledger_event(&like).unwrap_err();
        assert_eq!(err.kind(), "policy_evaluation");
        assert_eq!(engine.get_balance(&alice()).balance, amt("8"));
    }
}
