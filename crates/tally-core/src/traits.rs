// crates/tally-core/src/traits.rs

use crate::event::LedgerEvent;

/// Upstream admission hook consulted before an event touches engine state.
///
/// Signatures and guard policies are verified by the ledger of record; a gate
/// only expresses what this engine additionally refuses to apply (for
/// example, events that arrive without any signature at all).
///
/// Implemented by tally-treasury (`AcceptAll`, `RequireSignature`).
pub trait EventGate: Send + Sync {
    /// Return `Err(reason)` to reject the event without mutating state.
    fn check(&self, event: &LedgerEvent) -> Result<(), String>;
}
