//! Lock-free pipeline counters
//!
//! The message processor updates these on the hot path and the HTTP surface
//! renders them for Prometheus. All atomics use Relaxed ordering; they are
//! statistics only and never drive control flow.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{InteractionKind, RejectionReason};

const REASON_COUNT: usize = RejectionReason::ALL.len();

/// Counters for every processing outcome
#[derive(Debug)]
pub struct PipelineStats {
    received: AtomicU64,
    undecodable: AtomicU64,
    rejected: [AtomicU64; REASON_COUNT],
    stored_ratings: AtomicU64,
    stored_requests: AtomicU64,
    sink_failures: AtomicU64,
    sink_refused: AtomicU64,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            undecodable: AtomicU64::new(0),
            rejected: std::array::from_fn(|_| AtomicU64::new(0)),
            stored_ratings: AtomicU64::new(0),
            stored_requests: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            sink_refused: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_undecodable(&self) {
        self.undecodable.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self, reason: RejectionReason) {
        self.rejected[reason as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stored(&self, kind: InteractionKind) {
        let counter = match kind {
            InteractionKind::Rating => &self.stored_ratings,
            InteractionKind::Request => &self.stored_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed write that a table constraint refused; also counts as a sink failure
    #[inline]
    pub fn record_sink_refused(&self) {
        self.sink_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
            rejected: RejectionReason::ALL
                .iter()
                .map(|&reason| (reason, self.rejected[reason as usize].load(Ordering::Relaxed)))
                .collect(),
            stored_ratings: self.stored_ratings.load(Ordering::Relaxed),
            stored_requests: self.stored_requests.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            sink_refused: self.sink_refused.load(Ordering::Relaxed),
        }
    }

    /// Render counters in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        counter(
            &mut out,
            "exhibitstream_events_received_total",
            "Kafka messages handed to the processor",
        );
        let _ = writeln!(out, "exhibitstream_events_received_total {}", snapshot.received);

        counter(
            &mut out,
            "exhibitstream_events_undecodable_total",
            "Messages that were not a JSON object",
        );
        let _ = writeln!(out, "exhibitstream_events_undecodable_total {}", snapshot.undecodable);

        counter(
            &mut out,
            "exhibitstream_events_rejected_total",
            "Events rejected by a validation rule",
        );
        for (reason, count) in &snapshot.rejected {
            let _ = writeln!(
                out,
                "exhibitstream_events_rejected_total{{field=\"{}\",reason=\"{}\"}} {}",
                reason.field(),
                reason.code(),
                count
            );
        }

        counter(
            &mut out,
            "exhibitstream_interactions_stored_total",
            "Normalized interactions written to the database",
        );
        let _ = writeln!(
            out,
            "exhibitstream_interactions_stored_total{{kind=\"rating\"}} {}",
            snapshot.stored_ratings
        );
        let _ = writeln!(
            out,
            "exhibitstream_interactions_stored_total{{kind=\"request\"}} {}",
            snapshot.stored_requests
        );

        counter(
            &mut out,
            "exhibitstream_sink_failures_total",
            "Database writes that failed",
        );
        let _ = writeln!(out, "exhibitstream_sink_failures_total {}", snapshot.sink_failures);

        counter(
            &mut out,
            "exhibitstream_sink_refused_total",
            "Database writes refused by a table constraint",
        );
        let _ = writeln!(out, "exhibitstream_sink_refused_total {}", snapshot.sink_refused);

        out
    }
}

fn counter(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub undecodable: u64,
    pub rejected: Vec<(RejectionReason, u64)>,
    pub stored_ratings: u64,
    pub stored_requests: u64,
    pub sink_failures: u64,
    pub sink_refused: u64,
}

impl StatsSnapshot {
    /// Total rejections across all rules
    pub fn rejected_total(&self) -> u64 {
        self.rejected.iter().map(|(_, count)| count).sum()
    }

    /// Rejections for one rule
    pub fn rejected_for(&self, reason: RejectionReason) -> u64 {
        self.rejected
            .iter()
            .find(|(r, _)| *r == reason)
            .map_or(0, |(_, count)| *count)
    }

    /// Total stored interactions
    pub fn stored_total(&self) -> u64 {
        self.stored_ratings + self.stored_requests
    }
}
