// crates/fabric-mcp/src/audit.rs
// ============================================================================
// Module: Tool Audit Logging
// Description: Structured audit events for tool invocations.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! One audit event is emitted per tool invocation, carrying the tool name,
//! outcome, and failure message when present. Sinks are intentionally
//! lightweight so deployments can route events to their preferred pipeline.
//! Token values and upstream response bodies are never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome classification for a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Handler completed and a success result was emitted.
    Succeeded,
    /// Invocation failed at any stage; an error result was emitted.
    Failed,
}

/// Audit event payload for a single tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requested tool name as received on the wire.
    pub tool: String,
    /// Invocation outcome.
    pub outcome: ToolOutcome,
    /// Failure message when the invocation failed.
    pub message: Option<String>,
}

impl ToolAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(tool: &str, outcome: ToolOutcome, message: Option<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "tool_call",
            timestamp_ms,
            tool: tool.to_string(),
            outcome,
            message,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for tool invocation events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &ToolAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &ToolAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &ToolAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
