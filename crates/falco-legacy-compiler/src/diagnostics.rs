// crates/falco-legacy-compiler/src/diagnostics.rs
// ============================================================================
// Module: Skip Diagnostics
// Description: Structured skip notices and batch summaries.
// Purpose: Report dropped records without coupling to a logging backend.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Ineligible records are advisory, not errors. The batch compiler reports
//! each one as a [`SkipEvent`] and finishes with a [`BatchSummaryEvent`].
//! Sinks write JSON lines; callers pick stderr, an append-only file, or
//! nothing, and tests collect events in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::eligibility::SkipReason;
use crate::identifiers::CanonicalName;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Notice for one ineligible record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Group holding the record.
    pub group: String,
    /// Raw test name.
    pub record: String,
    /// Canonical test name.
    pub canonical_name: CanonicalName,
    /// Structured skip reason.
    #[serde(flatten)]
    pub reason: SkipReason,
    /// Human-readable reason.
    pub message: String,
}

/// Totals for one compiled batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummaryEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Records in the document.
    pub records: usize,
    /// Descriptors produced.
    pub compiled: usize,
    /// Records skipped.
    pub skipped: usize,
}

impl SkipEvent {
    /// Builds a skip notice.
    #[must_use]
    pub fn new(group: &str, record: &str, canonical_name: CanonicalName, reason: SkipReason) -> Self {
        let message = format!("skipping {canonical_name}: {reason}");
        Self {
            event: "record_skipped",
            timestamp_ms: now_ms(),
            group: group.to_string(),
            record: record.to_string(),
            canonical_name,
            reason,
            message,
        }
    }
}

impl BatchSummaryEvent {
    /// Builds a batch summary.
    #[must_use]
    pub fn new(records: usize, compiled: usize, skipped: usize) -> Self {
        Self {
            event: "batch_compiled",
            timestamp_ms: now_ms(),
            records,
            compiled,
            skipped,
        }
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for skip notices.
pub trait SkipSink: Send + Sync {
    /// Records one skipped record.
    fn record_skip(&self, event: &SkipEvent);

    /// Records the batch summary.
    fn record_summary(&self, _event: &BatchSummaryEvent) {}
}

/// Sink that logs JSON lines to stderr.
pub struct StderrSkipSink;

impl SkipSink for StderrSkipSink {
    fn record_skip(&self, event: &SkipEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_summary(&self, event: &BatchSummaryEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileSkipSink {
    /// Append-mode log file.
    file: Mutex<std::fs::File>,
}

impl FileSkipSink {
    /// Opens (or creates) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl SkipSink for FileSkipSink {
    fn record_skip(&self, event: &SkipEvent) {
        self.write_line(event);
    }

    fn record_summary(&self, event: &BatchSummaryEvent) {
        self.write_line(event);
    }
}

/// No-op sink.
pub struct NoopSkipSink;

impl SkipSink for NoopSkipSink {
    fn record_skip(&self, _event: &SkipEvent) {}
}

/// Sink that keeps events in memory.
#[derive(Default)]
pub struct MemorySkipSink {
    /// Recorded skip notices.
    skips: Mutex<Vec<SkipEvent>>,
    /// Recorded summaries.
    summaries: Mutex<Vec<BatchSummaryEvent>>,
}

impl MemorySkipSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded skip notices in arrival order.
    #[must_use]
    pub fn skips(&self) -> Vec<SkipEvent> {
        self.skips.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded summaries in arrival order.
    #[must_use]
    pub fn summaries(&self) -> Vec<BatchSummaryEvent> {
        self.summaries.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl SkipSink for MemorySkipSink {
    fn record_skip(&self, event: &SkipEvent) {
        if let Ok(mut events) = self.skips.lock() {
            events.push(event.clone());
        }
    }

    fn record_summary(&self, event: &BatchSummaryEvent) {
        if let Ok(mut events) = self.summaries.lock() {
            events.push(event.clone());
        }
    }
}
