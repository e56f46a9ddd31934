//! Kafka integration module for interaction events
//!
//! This module provides:
//! - Consumer configuration, including SASL for managed clusters
//! - Event consumer with manual, batched offset commits
//! - Message processing: decode, validate, normalize, store
//! - Graceful shutdown with a final offset commit

mod config;
mod consumer;
mod processor;

pub use config::KafkaConfig;
pub use consumer::{EventConsumer, OffsetTracker};
pub use processor::{MessageProcessor, ProcessingOutcome};

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Kafka-specific error types
#[derive(Debug, Error)]
pub enum KafkaIntegrationError {
    #[error("Kafka connection error: {0}")]
    ConnectionError(#[from] KafkaError),

    #[error("Offset commit failed: {0}")]
    OffsetCommitError(String),
}

impl From<KafkaIntegrationError> for crate::error::Error {
    fn from(err: KafkaIntegrationError) -> Self {
        crate::error::Error::kafka(err.to_string())
    }
}
