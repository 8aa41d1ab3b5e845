// crates/tally-treasury/src/shared.rs
//
// SharedTreasury: a cloneable handle to one ledger's engine.
//
// Constructed once per ledger and passed to every caller that reads or writes
// it; there is no process-wide instance. Writers hold the write lock for the
// whole of `process_ledger_event`, so no reader ever observes an event half
// applied. Readers share the read lock.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::event::LedgerEvent;
use tally_core::identity::ActorId;

use crate::balance::{TokenAccount, TransactionRecord};
use crate::engine::{BatchError, EngineError, EngineOutcome, EngineSnapshot, TreasuryEngine};
use crate::explain::Explanation;

/// Thread-safe handle to a `TreasuryEngine`.
#[derive(Clone)]
pub struct SharedTreasury {
    inner: Arc<RwLock<TreasuryEngine>>,
}

impl SharedTreasury {
    pub fn new(engine: TreasuryEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    // A panic while holding the lock cannot leave partial state behind (the
    // engine mutates only after every check passed), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, TreasuryEngine> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TreasuryEngine> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_ledger_event(&self, event: &LedgerEvent) -> Result<EngineOutcome, EngineError> {
        self.write().process_ledger_event(event)
    }

    /// Apply a batch under a single write lock.
    pub fn process_batch(&self, events: &[LedgerEvent]) -> Result<Vec<EngineOutcome>, BatchError> {
        self.write().process_batch(events)
    }

    pub fn get_balance(&self, actor: &ActorId) -> TokenAccount {
        self.read().get_balance(actor)
    }

    pub fn get_history(&self, actor: &ActorId) -> Vec<TransactionRecord> {
        self.read().get_history(actor)
    }

    pub fn explain(&self, actor: &ActorId, epoch_end: Option<u64>) -> Result<Explanation, EngineError> {
        self.read().explain(actor, epoch_end)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.read().snapshot()
    }
}
