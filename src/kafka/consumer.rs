//! Kafka event consumer with manual offset management

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

use super::{KafkaConfig, KafkaIntegrationError, MessageProcessor};
use crate::error::Result;

/// Offsets that have been processed but not yet committed
#[derive(Debug)]
pub struct OffsetTracker {
    next_offsets: HashMap<(String, i32), i64>,
    since_commit: usize,
    last_commit: Instant,
    batch_size: usize,
    interval: Duration,
}

impl OffsetTracker {
    pub fn new(batch_size: usize, interval: Duration) -> Self {
        Self {
            next_offsets: HashMap::new(),
            since_commit: 0,
            last_commit: Instant::now(),
            batch_size: batch_size.max(1),
            interval,
        }
    }

    /// Record that the message at `offset` is done with
    pub fn track(&mut self, topic: &str, partition: i32, offset: i64) {
        let next = self
            .next_offsets
            .entry((topic.to_string(), partition))
            .or_insert(offset + 1);
        *next = (*next).max(offset + 1);
        self.since_commit += 1;
    }

    /// Messages processed since the last commit
    pub fn pending(&self) -> usize {
        self.since_commit
    }

    /// Enough messages for a batch commit
    pub fn batch_full(&self) -> bool {
        self.since_commit >= self.batch_size
    }

    /// Pending offsets have waited longer than the commit interval
    pub fn interval_due(&self) -> bool {
        self.since_commit > 0 && self.last_commit.elapsed() >= self.interval
    }

    /// Next offset to read for a partition, if any message was tracked
    pub fn next_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.next_offsets.get(&(topic.to_string(), partition)).copied()
    }

    /// Build the list handed to the broker on commit
    pub fn to_partition_list(&self) -> KafkaResult<TopicPartitionList> {
        let mut list = TopicPartitionList::new();
        for ((topic, partition), offset) in &self.next_offsets {
            list.add_partition_offset(topic, *partition, Offset::Offset(*offset))?;
        }
        Ok(list)
    }

    /// Forget everything after a successful commit
    pub fn reset(&mut self) {
        self.next_offsets.clear();
        self.since_commit = 0;
        self.last_commit = Instant::now();
    }
}

/// Event consumer that processes messages from Kafka
pub struct EventConsumer {
    /// Kafka consumer instance
    consumer: StreamConsumer,

    /// Message processor
    processor: MessageProcessor,

    /// Configuration
    config: KafkaConfig,
}

impl EventConsumer {
    /// Create a consumer and subscribe it to the events topic
    pub fn new(config: KafkaConfig, processor: MessageProcessor) -> Result<Self> {
        let consumer: StreamConsumer = config
            .build_consumer_config()
            .create()
            .map_err(KafkaIntegrationError::from)?;

        consumer
            .subscribe(&[&config.events_topic])
            .map_err(KafkaIntegrationError::from)?;

        info!(
            topic = %config.events_topic,
            group = %config.consumer_group,
            "Subscribed to events topic"
        );

        Ok(Self {
            consumer,
            processor,
            config,
        })
    }

    /// Consume until the shutdown flag is raised
    ///
    /// Every message advances the committed offset whatever its outcome, so a
    /// rejected or unstorable event is never redelivered.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(topic = %self.config.events_topic, "Starting Kafka consumer");

        let mut tracker =
            OffsetTracker::new(self.config.commit_batch_size, self.config.commit_interval());
        let mut commit_timer = tokio::time::interval(Duration::from_secs(1));

        let stream = self.consumer.stream();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Kafka consumer shutting down");
                        break;
                    }
                }
                _ = commit_timer.tick() => {
                    if tracker.interval_due() {
                        self.commit(&mut tracker);
                    }
                }
                message = stream.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka consumer error");
                            continue;
                        },
                        None => break,
                    };

                    let span = crate::kafka_span!(message.partition(), message.offset());
                    let outcome = self
                        .processor
                        .process_message(&message)
                        .instrument(span.clone())
                        .await;
                    span.record("outcome", outcome.as_str());

                    tracker.track(message.topic(), message.partition(), message.offset());
                    if tracker.batch_full() {
                        self.commit(&mut tracker);
                    }
                }
            }
        }

        if tracker.pending() > 0 {
            info!(pending = tracker.pending(), "Committing offsets before shutdown");
            self.commit(&mut tracker);
        }

        info!("Kafka consumer stopped");
        Ok(())
    }

    /// Commit tracked offsets; on failure they stay pending for the next try
    fn commit(&self, tracker: &mut OffsetTracker) {
        let result = tracker
            .to_partition_list()
            .and_then(|list| self.consumer.commit(&list, CommitMode::Sync));

        match result {
            Ok(()) => tracker.reset(),
            Err(e) => warn!(
                error = %KafkaIntegrationError::OffsetCommitError(e.to_string()),
                pending = tracker.pending(),
                "Offset commit failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_keeps_highest_offset_per_partition() {
        let mut tracker = OffsetTracker::new(10, Duration::from_secs(5));
        tracker.track("lmnh", 0, 4);
        tracker.track("lmnh", 0, 3);
        tracker.track("lmnh", 1, 9);

        assert_eq!(tracker.next_offset("lmnh", 0), Some(5));
        assert_eq!(tracker.next_offset("lmnh", 1), Some(10));
        assert_eq!(tracker.next_offset("lmnh", 2), None);
        assert_eq!(tracker.pending(), 3);
        assert_eq!(tracker.to_partition_list().unwrap().count(), 2);
    }

    #[test]
    fn test_tracker_batch_and_reset() {
        let mut tracker = OffsetTracker::new(2, Duration::from_secs(5));
        tracker.track("lmnh", 0, 0);
        assert!(!tracker.batch_full());
        tracker.track("lmnh", 0, 1);
        assert!(tracker.batch_full());

        tracker.reset();
        assert_eq!(tracker.pending(), 0);
        assert!(!tracker.batch_full());
        assert_eq!(tracker.next_offset("lmnh", 0), None);
    }

    #[test]
    fn test_tracker_interval_needs_pending_offsets() {
        let mut tracker = OffsetTracker::new(100, Duration::ZERO);
        assert!(!tracker.interval_due());
        tracker.track("lmnh", 0, 0);
        assert!(tracker.interval_due());
    }

    #[test]
    fn test_tracker_zero_batch_size_commits_every_message() {
        let mut tracker = OffsetTracker::new(0, Duration::from_secs(5));
        tracker.track("lmnh", 0, 0);
        assert!(tracker.batch_full());
    }

    #[tokio::test]
    async fn test_consumer_creation() {
        use crate::models::EventValidator;
        use crate::stats::PipelineStats;
        use crate::test_utils::{CollectingDiagnostics, MockInteractionRepository};
        use std::sync::Arc;

        let processor = MessageProcessor::new(
            EventValidator::default(),
            Arc::new(MockInteractionRepository::new()),
            Arc::new(CollectingDiagnostics::new()),
            Arc::new(PipelineStats::new()),
        );

        // librdkafka connects lazily, so no broker is needed here
        assert!(EventConsumer::new(KafkaConfig::default(), processor).is_ok());
    }
}
