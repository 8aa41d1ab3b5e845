// crates/tally-treasury/src/dedup.rs
//
// Record of applied event ids. Grows monotonically and is never pruned; the
// stored hash lets the engine tell a verbatim replay from a tampered re-send
// that reuses an id.

use std::collections::BTreeMap;

use tally_core::event::EventHash;

/// Event ids already applied, with the hash they were applied under.
#[derive(Debug, Clone, Default)]
pub struct DedupLedger {
    applied: BTreeMap<String, EventHash>,
}

impl DedupLedger {
    /// Create an empty DedupLedger.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_applied(&self, event_id: &str) -> bool {
        self.applied.contains_key(event_id)
    }

    /// Hash recorded when `event_id` was applied.
    pub fn applied_hash(&self, event_id: &str) -> Option<&EventHash> {
        self.applied.get(event_id)
    }

    /// Record an event as applied. An id is only ever recorded once.
    pub fn mark_applied(&mut self, event_id: &str, hash: EventHash) {
        self.applied.entry(event_id.to_string()).or_insert(hash);
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Applied ids in lexicographic order.
    pub fn event_ids(&self) -> impl Iterator<Item = &str> {
        self.applied.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ledger_is_empty() {
        let ledger = DedupLedger::new();
        assert!(ledger.is_empty());
        assert!(!ledger.has_applied("evt_1"));
    }

    #[test]
    fn test_mark_applied() {
        let mut ledger = DedupLedger::new();
        ledger.mark_applied("evt_1", EventHash([1u8; 32]));
        assert!(ledger.has_applied("evt_1"));
        assert_eq!(ledger.applied_hash("evt_1"), Some(&EventHash([1u8; 32])));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_first_hash_is_kept() {
        let mut ledger = DedupLedger::new();
        ledger.mark_applied("evt_1", EventHash([1u8; 32]));
        ledger.mark_applied("evt_1", EventHash([2u8; 32]));
        assert_eq!(ledger.applied_hash("evt_1"), Some(&EventHash([1u8; 32])));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_event_ids_sorted() {
        let mut ledger = DedupLedger::new();
        ledger.mark_applied("evt_b", EventHash::default());
        ledger.mark_applied("evt_a", EventHash::default());
        assert_eq!(ledger.event_ids().collect::<Vec<_>>(), vec!["evt_a", "evt_b"]);
    }
}
