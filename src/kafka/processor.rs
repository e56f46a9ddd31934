//! Message processing logic for interaction events

use std::sync::Arc;

use rdkafka::message::{BorrowedMessage, Message};
use tracing::{debug, error, info, warn, Level};

use crate::db::InteractionRepository;
use crate::diagnostics::DiagnosticSink;
use crate::models::{decode, normalize, EventValidator, InteractionKind, RejectionReason};
use crate::stats::PipelineStats;

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    /// Event was valid and written to its table
    Stored(InteractionKind),

    /// Payload was not a JSON object
    Dropped,

    /// Event broke a field rule
    Rejected(RejectionReason),

    /// Event was valid but the database write failed
    SinkFailed(String),
}

impl ProcessingOutcome {
    /// Short label for logs and spans
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingOutcome::Stored(_) => "stored",
            ProcessingOutcome::Dropped => "dropped",
            ProcessingOutcome::Rejected(_) => "rejected",
            ProcessingOutcome::SinkFailed(_) => "sink_failed",
        }
    }
}

/// Runs decode, validate, normalize and store for each payload
///
/// Nothing here is fatal: every payload ends in exactly one outcome.
#[derive(Clone)]
pub struct MessageProcessor {
    validator: EventValidator,
    repo: Arc<dyn InteractionRepository>,
    diagnostics: Arc<dyn DiagnosticSink>,
    stats: Arc<PipelineStats>,
}

impl MessageProcessor {
    /// Create a new message processor
    pub fn new(
        validator: EventValidator,
        repo: Arc<dyn InteractionRepository>,
        diagnostics: Arc<dyn DiagnosticSink>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            validator,
            repo,
            diagnostics,
            stats,
        }
    }

    /// Counters this processor updates
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Process a single Kafka message
    pub async fn process_message(&self, message: &BorrowedMessage<'_>) -> ProcessingOutcome {
        debug!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Processing message"
        );

        self.process_payload(message.payload().unwrap_or_default()).await
    }

    /// Process one raw payload
    pub async fn process_payload(&self, payload: &[u8]) -> ProcessingOutcome {
        self.stats.record_received();

        let Some(event) = decode(payload) else {
            debug!(bytes = payload.len(), "Dropping payload that is not a JSON object");
            self.stats.record_undecodable();
            return ProcessingOutcome::Dropped;
        };

        let validated = match self.validator.check(&event) {
            Ok(validated) => validated,
            Err(reason) => {
                self.diagnostics.report(Level::ERROR, &event, reason);
                self.stats.record_rejected(reason);
                return ProcessingOutcome::Rejected(reason);
            },
        };

        info!(event = %event, "Valid event received");

        let record = normalize(validated);
        let kind = record.kind();

        match self.repo.insert(&record).await {
            Ok(()) => {
                info!(
                    kind = %kind,
                    exhibition_id = record.exhibition_id(),
                    type_id = record.type_id(),
                    event_at = %record.recorded_at_text(),
                    "Successfully uploaded to database"
                );
                self.stats.record_stored(kind);
                ProcessingOutcome::Stored(kind)
            },
            Err(e) => {
                if e.is_constraint_violation() {
                    warn!(kind = %kind, "Database refused the record - {}", e);
                    self.stats.record_sink_refused();
                } else {
                    error!(kind = %kind, "Unable to upload to database - {}", e);
                }
                self.stats.record_sink_failure();
                ProcessingOutcome::SinkFailed(e.to_string())
            },
        }
    }
}
