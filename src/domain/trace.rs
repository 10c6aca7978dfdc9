use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceSource {
    Router,
    Gateway,
    Failover,
    System,
}

/// One timestamped line in an intent's execution trace. Entries are only
/// ever appended, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub source: TraceSource,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn push(&mut self, source: TraceSource, message: impl Into<String>) {
        self.entries.push(TraceEntry {
            timestamp: Utc::now(),
            source,
            message: message.into(),
        });
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }
}
