// crates/tally-treasury/tests/treasury_scenarios.rs
//
// End-to-end treasury scenarios: idempotent replay, reward correctness,
// replay determinism, chain integrity, and read safety. Uses only the public
// API of tally-core and tally-treasury.

use tally_core::amount::Amount;
use tally_core::event::{EventBuilder, EventHash, EventPayload, LedgerEvent, PolicyVersion};
use tally_core::identity::ActorId;
use tally_treasury::{
    append_to_journal, read_journal, EngineError, EngineOutcome, PolicyTable, RuleSet,
    TreasuryEngine,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ALICE: &str = "did:example:alice";
const BOB: &str = "did:example:bob";
const CAROL: &str = "did:example:carol";

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

fn actor(id: &str) -> ActorId {
    ActorId::from(id)
}

fn engine() -> TreasuryEngine {
    TreasuryEngine::new(PolicyTable::builtin())
}

/// Chain `payloads` into sealed events, one per (actor, payload) pair.
fn chain(items: Vec<(&str, EventPayload)>) -> Vec<LedgerEvent> {
    let mut events: Vec<LedgerEvent> = Vec::with_capacity(items.len());
    for (i, (actor_id, payload)) in items.into_iter().enumerate() {
        let builder = EventBuilder::new(format!("evt_{}", i + 1), actor_id, payload)
            .timestamp(1_000 + i as u64);
        let builder = match events.last() {
            Some(previous) => builder.follows(previous),
            None => builder,
        };
        events.push(builder.build().unwrap());
    }
    events
}

/// A deterministic mixed workload of `count` events.
fn workload(count: usize) -> Vec<LedgerEvent> {
    let actors = [ALICE, BOB, CAROL];
    let items = (0..count)
        .map(|i| {
            let who = actors[i % actors.len()];
            let payload = match i % 5 {
                0 => EventPayload::content_created(&format!("0.{}", (i * 7) % 10)),
                1 | 2 => EventPayload::interaction("like"),
                3 => EventPayload::unrecognized("ThreadUpdated"),
                _ => EventPayload::reward_allocated(actors[(i + 1) % actors.len()], "0.25"),
            };
            (who, payload)
        })
        .collect();
    chain(items)
}

fn snapshot_bytes(engine: &TreasuryEngine) -> Vec<u8> {
    serde_json::to_vec(&engine.snapshot()).unwrap()
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn test_two_actor_scenario_with_replay() {
    let events = chain(vec![
        (ALICE, EventPayload::content_created("0.8")),
        (BOB, EventPayload::interaction("like")),
    ]);
    let mut engine = engine();

    engine.process_ledger_event(&events[0]).unwrap();
    engine.process_ledger_event(&events[1]).unwrap();

    assert_eq!(engine.get_balance(&actor(ALICE)).balance, amt("8.0"));
    assert_eq!(engine.get_balance(&actor(BOB)).balance, amt("0.1"));
    assert_eq!(engine.get_history(&actor(ALICE)).len(), 1);
    assert_eq!(engine.get_history(&actor(BOB)).len(), 1);

    let before = snapshot_bytes(&engine);
    assert_eq!(
        engine.process_ledger_event(&events[0]).unwrap(),
        EngineOutcome::Duplicate
    );
    assert_eq!(engine.get_balance(&actor(ALICE)).balance, amt("8.0"));
    assert_eq!(engine.get_history(&actor(ALICE)).len(), 1);
    assert_eq!(snapshot_bytes(&engine), before);
}

// ---------------------------------------------------------------------------
// Idempotency
// ---------------------------------------------------------------------------

#[test]
fn test_processing_twice_equals_processing_once() {
    let events = workload(60);

    let mut once = engine();
    once.process_batch(&events).unwrap();

    let mut twice = engine();
    for event in &events {
        twice.process_ledger_event(event).unwrap();
        assert_eq!(
            twice.process_ledger_event(event).unwrap(),
            EngineOutcome::Duplicate
        );
    }

    assert_eq!(snapshot_bytes(&once), snapshot_bytes(&twice));
}

#[test]
fn test_full_log_replayed_again_changes_nothing() {
    let events = workload(30);
    let mut engine = engine();
    engine.process_batch(&events).unwrap();
    let before = snapshot_bytes(&engine);

    let outcomes = engine.process_batch(&events).unwrap();
    assert!(outcomes.iter().all(|o| *o == EngineOutcome::Duplicate));
    assert_eq!(snapshot_bytes(&engine), before);
}

// ---------------------------------------------------------------------------
// Reward correctness
// ---------------------------------------------------------------------------

#[test]
fn test_reward_amounts_are_exact() {
    let events = chain(vec![
        (ALICE, EventPayload::content_created("0.8")),
        (BOB, EventPayload::interaction("like")),
        (CAROL, EventPayload::content_created("0.123457")),
    ]);
    let mut engine = engine();
    let outcomes = engine.process_batch(&events).unwrap();

    assert_eq!(
        outcomes,
        vec![
            EngineOutcome::Applied {
                recipient: actor(ALICE),
                amount: amt("8"),
            },
            EngineOutcome::Applied {
                recipient: actor(BOB),
                amount: amt("0.1"),
            },
            EngineOutcome::Applied {
                recipient: actor(CAROL),
                amount: amt("1.23457"),
            },
        ]
    );
}

#[test]
fn test_later_policy_versions_do_not_change_history() {
    let events = chain(vec![(ALICE, EventPayload::content_created("0.5"))]);

    let original = TreasuryEngine::replay(PolicyTable::builtin(), &events).unwrap();

    let mut upgraded = PolicyTable::builtin();
    let mut v2 = RuleSet::v1();
    v2.version = PolicyVersion(2);
    v2.base_content_reward = amt("100");
    upgraded.register(v2).unwrap();
    let replayed = TreasuryEngine::replay(upgraded, &events).unwrap();

    assert_eq!(snapshot_bytes(&original), snapshot_bytes(&replayed));
    assert_eq!(replayed.get_balance(&actor(ALICE)).balance, amt("5"));
}

// ---------------------------------------------------------------------------
// Replay determinism
// ---------------------------------------------------------------------------

#[test]
fn test_rebuild_from_genesis_is_byte_identical() {
    let events = workload(90);

    let mut incremental = engine();
    for chunk in events.chunks(7) {
        incremental.process_batch(chunk).unwrap();
    }

    let rebuilt = TreasuryEngine::replay(PolicyTable::builtin(), incremental.events()).unwrap();
    assert_eq!(snapshot_bytes(&incremental), snapshot_bytes(&rebuilt));
    assert_eq!(
        incremental.balances().total_supply().unwrap(),
        rebuilt.balances().total_supply().unwrap()
    );
}

#[test]
fn test_rebuild_from_journal() {
    let path = std::env::temp_dir().join(format!("tally_scenario_{}.jsonl", Uuid::now_v7()));
    let events = workload(25);

    let mut live = engine();
    for event in &events {
        live.process_ledger_event(event).unwrap();
        append_to_journal(&path, event).unwrap();
    }

    let journal = read_journal(&path).unwrap();
    let rebuilt = TreasuryEngine::replay(PolicyTable::builtin(), &journal).unwrap();
    assert_eq!(snapshot_bytes(&live), snapshot_bytes(&rebuilt));

    std::fs::remove_file(&path).unwrap();
}

// ---------------------------------------------------------------------------
// Chain integrity
// ---------------------------------------------------------------------------

#[test]
fn test_chain_break_rejected_without_mutation() {
    let events = workload(10);
    let mut engine = engine();
    engine.process_batch(&events[..5]).unwrap();
    let before = snapshot_bytes(&engine);

    // Skip one event: the next link no longer matches.
    let err = engine.process_ledger_event(&events[6]).unwrap_err();
    match &err {
        EngineError::ChainBreak {
            event_id,
            expected,
            found,
        } => {
            assert_eq!(event_id, "evt_7");
            assert_eq!(*expected, events[4].event_hash);
            assert_eq!(*found, events[5].event_hash);
        }
        other => panic!("expected chain break, got {:?}", other),
    }
    assert_eq!(snapshot_bytes(&engine), before);

    // Ingestion can resume with the missing event.
    engine.process_batch(&events[5..]).unwrap();
    assert_eq!(engine.applied_count(), 10);
}

#[test]
fn test_forged_link_rejected() {
    let events = workload(3);
    let mut engine = engine();
    engine.process_batch(&events[..2]).unwrap();

    let mut forged = events[2].clone();
    forged.previous_event_hash = EventHash([0xee; 32]);
    forged.seal().unwrap();

    let err = engine.process_ledger_event(&forged).unwrap_err();
    assert_eq!(err.kind(), "chain_break");
    assert_eq!(engine.last_event_hash(), events[1].event_hash);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_actor_reads_are_safe() {
    let mut engine = engine();
    engine.process_batch(&workload(5)).unwrap();
    let stranger = actor("did:example:stranger");
    let account = engine.get_balance(&stranger);
    assert_eq!(account.balance, Amount::ZERO);
    assert_eq!(account.currency, "LMN");
    assert!(engine.get_history(&stranger).is_empty());
}

#[test]
fn test_history_follows_first_application_order() {
    let events = chain(vec![
        (ALICE, EventPayload::content_created("0.1")),
        (ALICE, EventPayload::interaction("like")),
        (BOB, EventPayload::interaction("like")),
        (ALICE, EventPayload::content_created("0.2")),
    ]);
    let mut engine = engine();
    engine.process_ledger_event(&events[0]).unwrap();
    engine.process_ledger_event(&events[1]).unwrap();
    engine.process_ledger_event(&events[0]).unwrap();
    engine.process_ledger_event(&events[2]).unwrap();
    engine.process_ledger_event(&events[1]).unwrap();
    engine.process_ledger_event(&events[3]).unwrap();

    let history = engine.get_history(&actor(ALICE));
    let ids: Vec<_> = history.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt_1", "evt_2", "evt_4"]);
    let sequences: Vec<_> = history.iter().map(|r| r.sequence_number).collect();
    assert_eq!(sequences, vec![0, 1, 3]);
}

#[test]
fn test_explain_total_matches_balance_for_every_actor() {
    let mut engine = engine();
    engine.process_batch(&workload(40)).unwrap();
    for id in [ALICE, BOB, CAROL] {
        let who = actor(id);
        let explanation = engine.explain(&who, None).unwrap();
        assert_eq!(explanation.total, engine.get_balance(&who).balance);
        assert_eq!(explanation.entries.len(), engine.get_history(&who).len());
    }
}
