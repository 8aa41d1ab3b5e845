// crates/tally-treasury/src/journal.rs
//
// JSON-lines event journal: the persisted source of truth for one ledger.
// Each line holds one LedgerEvent in wire form. Derived state (balances,
// histories, dedup set, chain pointer) is never persisted; it is rebuilt by
// replaying the journal.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

use tally_core::event::LedgerEvent;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Journal I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line could not be decoded; `line` is 1-based.
    #[error("Journal line {line} is not a valid event: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Could not encode event {event_id}: {source}")]
    Encode {
        event_id: String,
        source: serde_json::Error,
    },
}

/// Read every event from the journal at `path`, in order. Blank lines are
/// skipped. A missing file is an empty journal.
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<LedgerEvent>, JournalError> {
    let file = match File::open(path.as_ref()) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| JournalError::Decode {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

fn encode_line(event: &LedgerEvent) -> Result<String, JournalError> {
    let mut line = serde_json::to_string(event).map_err(|source| JournalError::Encode {
        event_id: event.event_id.clone(),
        source,
    })?;
    line.push('\n');
    Ok(line)
}

/// Append one event to the journal, creating the file if needed.
pub fn append_to_journal(path: impl AsRef<Path>, event: &LedgerEvent) -> Result<(), JournalError> {
    let line = encode_line(event)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

/// Replace the journal at `path` with `events`.
pub fn write_journal(path: impl AsRef<Path>, events: &[LedgerEvent]) -> Result<(), JournalError> {
    let mut contents = String::new();
    for event in events {
        contents.push_str(&encode_line(event)?);
    }
    fs::write(path.as_ref(), contents)?;
    Ok(())
}
