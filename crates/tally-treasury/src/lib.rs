// crates/tally-treasury/src/lib.rs
//
// tally-treasury: the deterministic, ledger-driven treasury engine.
//
// Consumes hash-chained LedgerEvents and derives per-actor balances and
// transaction history. Every event has at most one economic effect, rewards
// come from versioned rule sets pinned by each event, and all derived state
// can be rebuilt byte-for-byte by replaying the event journal from genesis.

pub mod balance;
pub mod dedup;
pub mod engine;
pub mod explain;
pub mod gate;
pub mod journal;
pub mod policy;
pub mod shared;

// Re-export key types for ergonomic access from downstream crates.
pub use balance::{BalanceStore, TokenAccount, TransactionRecord, DEFAULT_CURRENCY};
pub use dedup::DedupLedger;
pub use engine::{
    AccountSnapshot, BatchError, EngineError, EngineOutcome, EngineSnapshot, TreasuryEngine,
};
pub use explain::{explain, Explanation, ExplanationEntry};
pub use gate::{AcceptAll, RequireSignature};
pub use journal::{append_to_journal, read_journal, write_journal, JournalError};
pub use policy::{
    PolicyError, PolicyTable, RewardBreakdown, RewardDecision, RuleSet, BASE_CONTENT_REWARD_V1,
    LIKE_REWARD_V1,
};
pub use shared::SharedTreasury;
