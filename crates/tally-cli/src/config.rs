// crates/tally-cli/src/config.rs
//
// Runtime configuration for the Tally CLI.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::fs;

use tally_treasury::{PolicyError, PolicyTable, RuleSet, DEFAULT_CURRENCY};

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct TallyConfig {
    /// Path of the JSON-lines event journal.
    #[serde(default = "default_journal_path")]
    pub journal_path: String,

    /// Currency symbol reported on every account.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Refuse events that arrive without a signature and signer DID.
    #[serde(default)]
    pub require_signature: bool,

    /// Rule sets added on top of the built-in table. A version that is
    /// already defined cannot be redefined.
    #[serde(default)]
    pub policies: Vec<RuleSet>,
}

fn default_journal_path() -> String {
    "~/.tally/journal.jsonl".to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
            currency: default_currency(),
            log_level: default_log_level(),
            require_signature: false,
            policies: Vec::new(),
        }
    }
}

impl TallyConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: TallyConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// The built-in policy table extended with the configured rule sets.
    pub fn policy_table(&self) -> Result<PolicyTable, PolicyError> {
        let mut table = PolicyTable::builtin();
        for rule_set in &self.policies {
            table.register(rule_set.clone())?;
        }
        Ok(table)
    }

    /// Journal path with a leading `~/` expanded.
    pub fn journal_path(&self) -> String {
        expand_tilde(&self.journal_path)
    }
}

pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}
