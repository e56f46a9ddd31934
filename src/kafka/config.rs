//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Consumer group ID
    #[serde(default = "default_consumer_group")]
    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "exhibitstream")]
    pub consumer_group: String,

    /// Topic the exhibition kiosks publish to
    #[serde(default = "default_events_topic")]
    #[envconfig(from = "KAFKA_EVENTS_TOPIC", default = "lmnh")]
    pub events_topic: String,

    /// Where to start when the group has no committed offset
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "latest")]
    pub auto_offset_reset: String,

    /// Security protocol (e.g. SASL_SSL for managed clusters)
    #[serde(default)]
    #[envconfig(from = "KAFKA_SECURITY_PROTOCOL")]
    pub security_protocol: Option<String>,

    /// SASL mechanism (e.g. PLAIN)
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_MECHANISM")]
    pub sasl_mechanism: Option<String>,

    /// SASL username
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_USERNAME")]
    pub sasl_username: Option<String>,

    /// SASL password
    #[serde(default, skip_serializing)]
    #[envconfig(from = "KAFKA_SASL_PASSWORD")]
    pub sasl_password: Option<String>,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds
    #[serde(default = "default_max_poll_interval")]
    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Processed messages between offset commits
    #[serde(default = "default_commit_batch_size")]
    #[envconfig(from = "KAFKA_COMMIT_BATCH_SIZE", default = "100")]
    pub commit_batch_size: usize,

    /// Longest time processed offsets stay uncommitted, in milliseconds
    #[serde(default = "default_commit_interval_ms")]
    #[envconfig(from = "KAFKA_COMMIT_INTERVAL_MS", default = "5000")]
    pub commit_interval_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            consumer_group: default_consumer_group(),
            events_topic: default_events_topic(),
            auto_offset_reset: default_auto_offset_reset(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            session_timeout_ms: default_session_timeout(),
            max_poll_interval_ms: default_max_poll_interval(),
            commit_batch_size: default_commit_batch_size(),
            commit_interval_ms: default_commit_interval_ms(),
        }
    }
}

impl KafkaConfig {
    /// Get commit interval as Duration
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Build rdkafka consumer configuration
    ///
    /// Auto-commit is always off; the consumer commits offsets itself.
    pub fn build_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", &self.auto_offset_reset);

        if let Some(protocol) = &self.security_protocol {
            config.set("security.protocol", protocol);
        }
        if let Some(mechanism) = &self.sasl_mechanism {
            config.set("sasl.mechanisms", mechanism);
        }
        if let (Some(username), Some(password)) = (&self.sasl_username, &self.sasl_password) {
            config
                .set("sasl.username", username)
                .set("sasl.password", password);
        }

        config
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group() -> String {
    "exhibitstream".to_string()
}

fn default_events_topic() -> String {
    "lmnh".to_string()
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_max_poll_interval() -> u32 {
    300000 // 5 minutes
}

fn default_commit_batch_size() -> usize {
    100
}

fn default_commit_interval_ms() -> u64 {
    5000
}
