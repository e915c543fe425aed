// Copyright 2026 Merchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for scrape-run telemetry.
//!
//! The pipeline emits `ProgressEvent`s as phases and tasks complete; they
//! flow through a `tokio::sync::broadcast` channel to all subscribers
//! (CLI progress bars, logs). When no subscriber exists, events are
//! silently dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run ID this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// Pipeline accepted its inputs and is about to schedule tasks.
    RunStarted {
        urls: u32,
        proxies: u32,
        concurrency: u32,
    },
    /// A scheduling phase has started.
    PhaseStarted { phase: Phase, scheduled: u32 },
    /// A single URL resolved to a fresh record.
    UrlScraped {
        url: String,
        phase: Phase,
        elapsed_ms: u64,
    },
    /// A single task failed (timeout, navigation, missing anchor).
    TaskFailed {
        url: String,
        phase: Phase,
        reason: String,
    },
    /// A phase finished, including result collection.
    PhaseCompleted {
        phase: Phase,
        succeeded: u32,
        failed: u32,
        duration_ms: u64,
    },
    /// The reconciled snapshot hit disk.
    SnapshotWritten { path: String, total_count: u32 },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Identifies which scheduling phase a task ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Phase one: URLs previously stuck on the sold-out sentinel, re-scraped
    /// first because their ambiguous state is the most valuable to refine.
    SoldOutRescrape,
    /// Phase two: everything not already handled in phase one.
    Remainder,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SoldOutRescrape => write!(f, "Sold-Out Re-scrape"),
            Self::Remainder => write!(f, "Remainder"),
        }
    }
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an
/// error which we silently ignore (zero cost when nobody's watching).
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// 256 events covers a typical run (2 phase pairs + one event per URL).
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Fresh run identifier.
pub fn run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            run_id: "run-1".to_string(),
            seq: 1,
            event: ProgressEventKind::PhaseStarted {
                phase: Phase::SoldOutRescrape,
                scheduled: 12,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SoldOutRescrape"));
        assert!(json.contains("PhaseStarted"));

        // Roundtrip
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_phase_completed_serialization() {
        let event = ProgressEvent {
            run_id: "run-7".to_string(),
            seq: 40,
            event: ProgressEventKind::PhaseCompleted {
                phase: Phase::Remainder,
                succeeded: 37,
                failed: 3,
                duration_ms: 81_200,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("37"));
        assert!(json.contains("PhaseCompleted"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::SoldOutRescrape.to_string(), "Sold-Out Re-scrape");
        assert_eq!(Phase::Remainder.to_string(), "Remainder");
    }
}
