// crates/form-engine-core/src/runtime/audit.rs
// ============================================================================
// Module: Form Audit Logging
// Description: Structured audit events for form sessions.
// Purpose: Emit JSON-line lifecycle events without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The runtime reports lifecycle transitions to a [`FormAuditSink`]. Events
//! carry identifiers, page indices, and counts only; submitted values never
//! reach the audit trail. Sinks write one JSON object per line so deployments
//! can route them to any log pipeline.

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

use crate::core::identifiers::FormId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle transition being reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FormAuditKind {
    /// State was created fresh or restored from a verified snapshot.
    StateRestored {
        /// True when no inbound snapshot was supplied.
        fresh: bool,
    },
    /// A page was selected for display.
    PageDisplayed {
        /// Displayed page index.
        page_index: usize,
    },
    /// A page submission was processed.
    PageSubmitted {
        /// Submitted page index.
        page_index: usize,
        /// Number of error messages produced.
        error_count: usize,
    },
    /// The client requested an explicit page jump.
    NavigationOverride {
        /// Page displayed before the jump.
        from: usize,
        /// Requested page.
        to: usize,
    },
    /// A finisher started executing.
    FinisherInvoked {
        /// Finisher identifier.
        finisher: String,
    },
    /// A finisher cancelled the remaining chain.
    FinisherChainCancelled {
        /// Identifier of the cancelling finisher.
        finisher: String,
    },
    /// The last page was submitted and the chain completed.
    FormFinished,
    /// A signed snapshot was handed to the transport.
    StateWritten {
        /// Signed blob length in bytes.
        bytes: usize,
    },
}

/// Form audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormAuditEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Form the session belongs to.
    pub form_id: String,
    /// Transition details.
    #[serde(flatten)]
    pub kind: FormAuditKind,
}

impl FormAuditEvent {
    /// Creates a new audit event stamped with the current time.
    #[must_use]
    pub fn new(form_id: &FormId, kind: FormAuditKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            form_id: form_id.to_string(),
            kind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for form session events.
pub trait FormAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &FormAuditEvent);
}

/// Audit sink that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl FormAuditSink for NoopAuditSink {
    fn record(&self, _event: &FormAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAuditSink;

impl FormAuditSink for StderrAuditSink {
    fn record(&self, event: &FormAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl FormAuditSink for FileAuditSink {
    fn record(&self, event: &FormAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    /// Recorded events in order.
    events: Mutex<Vec<FormAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<FormAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded transitions without timestamps.
    #[must_use]
    pub fn kinds(&self) -> Vec<FormAuditKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl FormAuditSink for MemoryAuditSink {
    fn record(&self, event: &FormAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<T: FormAuditSink + ?Sized> FormAuditSink for &T {
    fn record(&self, event: &FormAuditEvent) {
        (**self).record(event);
    }
}
