// crates/tally-treasury/src/gate.rs
//
// Event gates: admission checks run before any engine state is touched.

use tally_core::event::LedgerEvent;
use tally_core::traits::EventGate;

/// Admits every event. Used when the ledger of record is fully trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EventGate for AcceptAll {
    fn check(&self, _event: &LedgerEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Rejects events that carry no signature or no signer DID.
///
/// The signature itself is not verified here; that happens upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireSignature;

impl EventGate for RequireSignature {
    fn check(&self, event: &LedgerEvent) -> Result<(), String> {
        if event.is_signed() {
            Ok(())
        } else {
            Err("event is unsigned".to_string())
        }
    }
}
