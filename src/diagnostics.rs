//! Diagnostics for rejected events
//!
//! The validator never formats or logs anything itself; it hands the event and
//! the violated rule to a [`DiagnosticSink`]. The production sink writes
//! structured `tracing` events whose message is the text log-based monitoring
//! keys on.

use tracing::Level;

use crate::models::{RawEvent, RejectionReason};

/// Receiver for validation diagnostics
pub trait DiagnosticSink: Send + Sync {
    /// Report that `event` was rejected for `reason`
    fn report(&self, level: Level, event: &RawEvent, reason: RejectionReason);
}

/// Render the diagnostic text for a rejected event
pub fn diagnostic_message(event: &RawEvent, reason: RejectionReason) -> String {
    format!("{} - Invalid: {}", event, reason)
}

/// Diagnostic sink backed by the global `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, level: Level, event: &RawEvent, reason: RejectionReason) {
        let message = diagnostic_message(event, reason);
        let field = reason.field();
        let code = reason.code();

        match level {
            Level::TRACE => tracing::trace!(field, reason = code, "{}", message),
            Level::DEBUG => tracing::debug!(field, reason = code, "{}", message),
            Level::INFO => tracing::info!(field, reason = code, "{}", message),
            Level::WARN => tracing::warn!(field, reason = code, "{}", message),
            _ => tracing::error!(field, reason = code, "{}", message),
        }
    }
}
