// crates/tally-treasury/src/balance.rs
//
// Per-actor balances and append-only transaction history.
//
// Accounts are created lazily with a zero balance and never removed. The only
// mutation is `apply_delta`, which computes the new balance before touching
// anything so that a failed update leaves both balance and history unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tally_core::amount::Amount;
use tally_core::error::ArithmeticError;
use tally_core::event::{LedgerEvent, PolicyVersion};
use tally_core::identity::ActorId;

/// Currency symbol used when none is configured.
pub const DEFAULT_CURRENCY: &str = "LMN";

/// Point-in-time view of one actor's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub actor: ActorId,
    pub balance: Amount,
    pub currency: String,
}

/// One applied balance change, derived 1:1 from a ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// `tx:<event_id>`.
    pub id: String,
    /// Back-reference to the source event.
    pub event_id: String,
    /// Event type label.
    pub reason: String,
    /// Signed delta applied to the balance.
    pub amount: Amount,
    /// Copied from the source event.
    pub timestamp: u64,
    pub sequence_number: u64,
    pub policy_version: PolicyVersion,
}

impl TransactionRecord {
    pub fn for_event(event: &LedgerEvent, amount: Amount) -> Self {
        Self {
            id: format!("tx:{}", event.event_id),
            event_id: event.event_id.clone(),
            reason: event.event_type().to_string(),
            amount,
            timestamp: event.timestamp,
            sequence_number: event.sequence_number,
            policy_version: event.policy_version,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AccountState {
    balance: Amount,
    history: Vec<TransactionRecord>,
}

/// Balances and histories for every actor seen by the engine.
#[derive(Debug, Clone)]
pub struct BalanceStore {
    currency: String,
    accounts: BTreeMap<ActorId, AccountState>,
}

impl BalanceStore {
    /// Create an empty store denominated in `currency`.
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            accounts: BTreeMap::new(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Current account for `actor`; a zero-balance account if never seen.
    pub fn get_balance(&self, actor: &ActorId) -> TokenAccount {
        TokenAccount {
            actor: actor.clone(),
            balance: self
                .accounts
                .get(actor)
                .map(|account| account.balance)
                .unwrap_or(Amount::ZERO),
            currency: self.currency.clone(),
        }
    }

    /// Snapshot of `actor`'s records, oldest first.
    pub fn get_history(&self, actor: &ActorId) -> Vec<TransactionRecord> {
        self.accounts
            .get(actor)
            .map(|account| account.history.clone())
            .unwrap_or_default()
    }

    /// Ensure an account exists for `actor`.
    pub fn open_account(&mut self, actor: &ActorId) {
        self.accounts.entry(actor.clone()).or_default();
    }

    /// Add `amount` to `actor`'s balance and append `record`, both or neither.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    /// Returns `ArithmeticError::Overflow` if the balance would overflow and
    /// `ArithmeticError::Underflow` if it would go negative.
    pub fn apply_delta(
        &mut self,
        actor: &ActorId,
        amount: Amount,
        record: TransactionRecord,
    ) -> Result<Amount, ArithmeticError> {
        let current = self.get_balance(actor).balance;
        let updated = current.checked_add(amount)?;
        if updated.is_negative() {
            return Err(ArithmeticError::Underflow);
        }

        let account = self.accounts.entry(actor.clone()).or_default();
        account.balance = updated;
        account.history.push(record);
        Ok(updated)
    }

    /// Every actor with an account, in sorted order.
    pub fn actors(&self) -> Vec<ActorId> {
        self.accounts.keys().cloned().collect()
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Result<Amount, ArithmeticError> {
        Amount::checked_sum(self.accounts.values().map(|account| account.balance))
    }
}

impl Default for BalanceStore {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}
