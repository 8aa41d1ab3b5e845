// crates/tally-cli/src/output.rs
//
// Output formatting utilities for the Tally CLI.
// Supports table and JSON output modes.

use serde::Serialize;
use tabled::{Table, Tabled};

use tally_treasury::{ExplanationEntry, TokenAccount, TransactionRecord};

/// Output format for CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    Table,
    /// JSON output for machine consumption.
    Json,
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

#[derive(Tabled)]
pub struct AccountRow {
    #[tabled(rename = "Actor")]
    pub actor: String,
    #[tabled(rename = "Balance")]
    pub balance: String,
    #[tabled(rename = "Currency")]
    pub currency: String,
    #[tabled(rename = "Transactions")]
    pub transactions: usize,
}

impl AccountRow {
    pub fn new(account: &TokenAccount, transactions: usize) -> Self {
        Self {
            actor: account.actor.to_string(),
            balance: account.balance.to_string(),
            currency: account.currency.clone(),
            transactions,
        }
    }
}

#[derive(Tabled)]
pub struct HistoryRow {
    #[tabled(rename = "Seq")]
    pub sequence_number: u64,
    #[tabled(rename = "Event")]
    pub event_id: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[tabled(rename = "Timestamp")]
    pub timestamp: u64,
    #[tabled(rename = "Policy")]
    pub policy_version: String,
}

impl From<&TransactionRecord> for HistoryRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            sequence_number: record.sequence_number,
            event_id: record.event_id.clone(),
            reason: record.reason.clone(),
            amount: record.amount.to_string(),
            timestamp: record.timestamp,
            policy_version: record.policy_version.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct ExplainRow {
    #[tabled(rename = "Seq")]
    pub sequence_number: u64,
    #[tabled(rename = "Event")]
    pub event_id: String,
    #[tabled(rename = "Type")]
    pub event_type: String,
    #[tabled(rename = "Base")]
    pub base: String,
    #[tabled(rename = "Multiplier")]
    pub multiplier: String,
    #[tabled(rename = "Bonus")]
    pub bonus: String,
    #[tabled(rename = "Cap")]
    pub cap_adjustment: String,
    #[tabled(rename = "Guards")]
    pub guards: String,
    #[tabled(rename = "Reward")]
    pub reward: String,
    #[tabled(rename = "Running")]
    pub running_total: String,
}

impl From<&ExplanationEntry> for ExplainRow {
    fn from(entry: &ExplanationEntry) -> Self {
        let breakdown = &entry.breakdown;
        Self {
            sequence_number: entry.sequence_number,
            event_id: entry.event_id.clone(),
            event_type: entry.event_type.clone(),
            base: breakdown.base.to_string(),
            multiplier: breakdown
                .multiplier
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
            bonus: breakdown.bonus.to_string(),
            cap_adjustment: breakdown.cap_adjustment.to_string(),
            guards: if breakdown.guards.is_empty() {
                "-".to_string()
            } else {
                breakdown.guards.join(", ")
            },
            reward: breakdown.total.to_string(),
            running_total: entry.running_total.to_string(),
        }
    }
}
