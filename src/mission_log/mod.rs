//! Mission-Log Aggregator
//!
//! Append-only ring buffer of narrative records from every subsystem, keyed
//! by a monotonic sequence. Snapshots return the most recent records plus
//! category/severity histograms over the snapshot window.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

// ============================================================================
// Record Types
// ============================================================================

/// Originating subsystem of a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Clock,
    Scheduler,
    Checklist,
    Autopilot,
    Resources,
    Comms,
    Manual,
    Docking,
    Entry,
    Scoring,
    Audio,
    Internal,
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Clock => "clock",
            LogCategory::Scheduler => "scheduler",
            LogCategory::Checklist => "checklist",
            LogCategory::Autopilot => "autopilot",
            LogCategory::Resources => "resources",
            LogCategory::Comms => "comms",
            LogCategory::Manual => "manual",
            LogCategory::Docking => "docking",
            LogCategory::Entry => "entry",
            LogCategory::Scoring => "scoring",
            LogCategory::Audio => "audio",
            LogCategory::Internal => "internal",
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
    Failure,
}

impl LogSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Failure => "failure",
        }
    }
}

impl std::fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub sequence: u64,
    pub timestamp_seconds: f64,
    pub category: LogCategory,
    pub source: String,
    pub severity: LogSeverity,
    pub message: String,
    /// Structured context; `Null` when a record carries none.
    #[serde(default)]
    pub context: serde_json::Value,
}

// ============================================================================
// Aggregator
// ============================================================================

pub struct MissionLog {
    entries: VecDeque<LogRecord>,
    max_entries: usize,
    next_sequence: u64,
    total_recorded: u64,
}

impl MissionLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(256)),
            max_entries: max_entries.max(1),
            next_sequence: 0,
            total_recorded: 0,
        }
    }

    /// Append a record without structured context.
    pub fn record(
        &mut self,
        timestamp_seconds: f64,
        category: LogCategory,
        source: &str,
        severity: LogSeverity,
        message: impl Into<String>,
    ) {
        self.record_with_context(
            timestamp_seconds,
            category,
            source,
            severity,
            message,
            serde_json::Value::Null,
        );
    }

    /// Append a record with structured context.
    pub fn record_with_context(
        &mut self,
        timestamp_seconds: f64,
        category: LogCategory,
        source: &str,
        severity: LogSeverity,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        let record = LogRecord {
            sequence: self.next_sequence,
            timestamp_seconds,
            category,
            source: source.to_string(),
            severity,
            message: message.into(),
            context,
        };
        self.next_sequence += 1;
        self.total_recorded += 1;
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records appended over the whole run, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Count of retained records at or above `severity`.
    pub fn count_at_or_above(&self, severity: LogSeverity) -> usize {
        self.entries.iter().filter(|r| r.severity >= severity).count()
    }

    /// The most recent `limit` records (oldest first) plus histograms over
    /// that window.
    pub fn snapshot(&self, limit: usize) -> MissionLogSnapshot {
        let skip = self.entries.len().saturating_sub(limit);
        let window: Vec<LogRecord> = self.entries.iter().skip(skip).cloned().collect();

        let mut categories: BTreeMap<String, u64> = BTreeMap::new();
        let mut severities: BTreeMap<String, u64> = BTreeMap::new();
        for record in &window {
            *categories.entry(record.category.as_str().to_string()).or_default() += 1;
            *severities.entry(record.severity.as_str().to_string()).or_default() += 1;
        }

        MissionLogSnapshot {
            entries: window,
            categories,
            severities,
            total_recorded: self.total_recorded,
        }
    }

    /// Flush every retained record to a JSON file (`--log-file`).
    pub fn flush_to_file(&self, path: &Path, pretty: bool) -> std::io::Result<()> {
        let flush = MissionLogFlush {
            flushed_at: chrono::Utc::now().to_rfc3339(),
            total_recorded: self.total_recorded,
            entries: self.entries.iter().cloned().collect(),
        };
        let contents = if pretty {
            serde_json::to_string_pretty(&flush)
        } else {
            serde_json::to_string(&flush)
        }
        .map_err(std::io::Error::other)?;
        std::fs::write(path, contents)
    }
}

/// Read-only snapshot consumed by the frame builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissionLogSnapshot {
    pub entries: Vec<LogRecord>,
    pub categories: BTreeMap<String, u64>,
    pub severities: BTreeMap<String, u64>,
    pub total_recorded: u64,
}

#[derive(Debug, Serialize)]
struct MissionLogFlush {
    flushed_at: String,
    total_recorded: u64,
    entries: Vec<LogRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log(max: usize) -> MissionLog {
        MissionLog::new(max)
    }

    #[test]
    fn sequence_is_monotonic_across_eviction() {
        let mut log = make_log(2);
        for i in 0..5 {
            log.record(
                i as f64,
                LogCategory::Clock,
                "tick",
                LogSeverity::Info,
                format!("tick {i}"),
            );
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_recorded(), 5);
        let snap = log.snapshot(10);
        assert_eq!(snap.entries[0].sequence, 3);
        assert_eq!(snap.entries[1].sequence, 4);
    }

    #[test]
    fn snapshot_histograms_cover_window_only() {
        let mut log = make_log(16);
        log.record(0.0, LogCategory::Scheduler, "ev", LogSeverity::Info, "armed");
        log.record(1.0, LogCategory::Scheduler, "ev", LogSeverity::Failure, "failed");
        log.record(2.0, LogCategory::Resources, "power", LogSeverity::Warning, "low");

        let snap = log.snapshot(2);
        assert_eq!(snap.entries.len(), 2);
        assert_eq!(snap.categories.get("scheduler"), Some(&1));
        assert_eq!(snap.categories.get("resources"), Some(&1));
        assert_eq!(snap.severities.get("failure"), Some(&1));
        assert_eq!(snap.severities.get("info"), None);
    }

    #[test]
    fn severity_ordering_supports_counts() {
        let mut log = make_log(16);
        log.record(0.0, LogCategory::Manual, "q", LogSeverity::Info, "ok");
        log.record(0.0, LogCategory::Manual, "q", LogSeverity::Error, "bad");
        log.record(0.0, LogCategory::Manual, "q", LogSeverity::Failure, "worse");
        assert_eq!(log.count_at_or_above(LogSeverity::Error), 2);
    }
}
