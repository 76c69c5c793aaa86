//! Metrics for the delta channel
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

pub const CHANNEL_CONNECTIONS: &str = "channel.connections";
pub const CHANNEL_SUBMISSIONS: &str = "channel.submissions";
pub const CHANNEL_DELTAS_DELIVERED: &str = "channel.deltas.delivered";
pub const CHANNEL_ACKS_DELIVERED: &str = "channel.acks.delivered";
pub const CHANNEL_NACKS_DELIVERED: &str = "channel.nacks.delivered";
pub const CHANNEL_COMMITS_DELIVERED: &str = "channel.commits.delivered";
pub const CHANNEL_RECOVERABLE_NACKS: &str = "channel.nacks.recoverable";
pub const CHANNEL_STALE_RESPONSES: &str = "channel.responses.stale";
pub const CHANNEL_FAILURES: &str = "channel.failures";
pub const CHANNEL_DEFERRED_DEPTH: &str = "channel.deferred.depth";
pub const SCENARIO_REPLAY_DURATION: &str = "sim.replay.duration_ms";

/// Register descriptions for every metric the crate records
pub fn init_metrics() {
    describe_counter!(CHANNEL_CONNECTIONS, "Connection notices accepted");
    describe_counter!(CHANNEL_SUBMISSIONS, "Client deltas handed to the transport");
    describe_counter!(CHANNEL_DELTAS_DELIVERED, "Server deltas delivered to receivers");
    describe_counter!(CHANNEL_ACKS_DELIVERED, "Submission acks delivered to receivers");
    describe_counter!(CHANNEL_NACKS_DELIVERED, "Application-level nacks delivered to receivers");
    describe_counter!(CHANNEL_COMMITS_DELIVERED, "Commit notices delivered to receivers");
    describe_counter!(CHANNEL_RECOVERABLE_NACKS, "Nacks raised as recoverable errors");
    describe_counter!(CHANNEL_STALE_RESPONSES, "Responses dropped for belonging to an old epoch");
    describe_counter!(CHANNEL_FAILURES, "Fatal protocol errors");
    describe_gauge!(CHANNEL_DEFERRED_DEPTH, "Events held in the deferred queue");
    describe_histogram!(SCENARIO_REPLAY_DURATION, "Scenario replay duration in milliseconds");
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Records elapsed wall time into a histogram when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.name).record(elapsed_ms);
        elapsed_ms
    }
}
