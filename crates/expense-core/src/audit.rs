// crates/expense-core/src/audit.rs
// ============================================================================
// Module: Expense Audit Logging
// Description: Structured audit events for the expense tracker.
// Purpose: Emit JSON-line records for requests, fallbacks, and chat tools.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are the tracker's log stream. Each event is one JSON object
//! carrying an `event` name and a millisecond timestamp, followed by
//! event-specific fields. Sinks decide where lines go: stderr, an append-only
//! file, or nowhere.

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

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event-specific fields.
    #[serde(flatten)]
    pub detail: AuditDetail,
}

/// Event-specific audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuditDetail {
    /// Completed HTTP request.
    HttpRequest {
        /// HTTP method.
        method: String,
        /// Matched request path.
        path: String,
        /// Response status code.
        status: u16,
        /// Status class label (`ok`, `client_error`, `server_error`).
        outcome: &'static str,
        /// Handling latency in milliseconds.
        latency_ms: u64,
        /// Upper bound of the latency histogram bucket; null past the last
        /// bucket.
        latency_bucket_ms: Option<u64>,
    },
    /// Store call that failed and fell back to demo data.
    StoreFallback {
        /// Procedure name.
        procedure: &'static str,
        /// Store error message.
        error: String,
    },
    /// Chat tool invocation.
    ChatTool {
        /// Tool name requested by the model.
        tool: String,
        /// Short outcome label.
        outcome: &'static str,
    },
    /// Startup condition worth flagging.
    StartupWarning {
        /// Warning text.
        message: String,
    },
}

impl AuditEvent {
    /// Builds an `http_request` event.
    #[must_use]
    pub fn http_request(
        method: &str,
        path: &str,
        status: u16,
        outcome: &'static str,
        latency_ms: u64,
        latency_bucket_ms: Option<u64>,
    ) -> Self {
        Self::new(
            "http_request",
            AuditDetail::HttpRequest {
                method: method.to_string(),
                path: path.to_string(),
                status,
                outcome,
                latency_ms,
                latency_bucket_ms,
            },
        )
    }

    /// Builds a `store_fallback` event.
    #[must_use]
    pub fn store_fallback(procedure: &'static str, error: &str) -> Self {
        Self::new(
            "store_fallback",
            AuditDetail::StoreFallback {
                procedure,
                error: error.to_string(),
            },
        )
    }

    /// Builds a `chat_tool` event.
    #[must_use]
    pub fn chat_tool(tool: &str, outcome: &'static str) -> Self {
        Self::new(
            "chat_tool",
            AuditDetail::ChatTool {
                tool: tool.to_string(),
                outcome,
            },
        )
    }

    /// Builds a `startup_warning` event.
    #[must_use]
    pub fn startup_warning(message: &str) -> Self {
        Self::new(
            "startup_warning",
            AuditDetail::StartupWarning {
                message: message.to_string(),
            },
        )
    }

    /// Stamps an event with the current time.
    fn new(event: &'static str, detail: AuditDetail) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        Self {
            event,
            timestamp_ms,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for expense tracker events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
