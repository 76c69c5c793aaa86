//! Transport seam consumed by the channel
//!
//! Submissions go out through [`WaveletTransport::submit`]. The answer comes
//! back later as a message: the transport (or whatever drives it) hands the
//! [`SubmitTicket`] and a [`SubmitResponse`] to
//! `WaveletDeltaChannel::on_submit_response`.

use crate::core_channel::status::{ReturnCode, ReturnStatus};
use crate::core_ops::ClientDelta;
use crate::core_version::VersionId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Identifies one submission within one connection epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmitTicket {
    /// Connection epoch the submission was made in
    pub epoch: u64,
    /// Submission number within the epoch, starting at zero
    pub sequence: u64,
}

/// Server answer to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub ops_applied: usize,
    /// Resulting version for an ack, version of the failure for a nack
    pub version: VersionId,
    pub timestamp: u64,
    pub status: ReturnStatus,
}

impl SubmitResponse {
    pub fn ack(ops_applied: usize, version: VersionId, timestamp: u64) -> Self {
        Self {
            ops_applied,
            version,
            timestamp,
            status: ReturnStatus::ok(),
        }
    }

    pub fn nack(version: VersionId, code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            ops_applied: 0,
            version,
            timestamp: 0,
            status: ReturnStatus::new(code, message),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.status.is_ok()
    }
}

/// Outbound half of the wavelet connection
pub trait WaveletTransport: Send {
    /// Hand `delta` to the server. The response must later be routed back
    /// with the same `ticket`.
    fn submit(&mut self, delta: ClientDelta, ticket: SubmitTicket);
}

/// A submission captured by an in-memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub delta: ClientDelta,
    pub ticket: SubmitTicket,
}

/// In-memory transport that queues submissions for a test or simulator to
/// answer.
#[derive(Debug, Default)]
pub struct QueuedTransport {
    submitted: VecDeque<PendingSubmission>,
    total: u64,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest submission not yet answered
    pub fn next_pending(&mut self) -> Option<PendingSubmission> {
        self.submitted.pop_front()
    }

    pub fn peek_pending(&self) -> Option<&PendingSubmission> {
        self.submitted.front()
    }

    pub fn pending_len(&self) -> usize {
        self.submitted.len()
    }

    /// Number of submissions ever made through this transport
    pub fn total_submitted(&self) -> u64 {
        self.total
    }
}

impl WaveletTransport for QueuedTransport {
    fn submit(&mut self, delta: ClientDelta, ticket: SubmitTicket) {
        self.total += 1;
        self.submitted.push_back(PendingSubmission { delta, ticket });
    }
}

impl WaveletTransport for mpsc::UnboundedSender<PendingSubmission> {
    fn submit(&mut self, delta: ClientDelta, ticket: SubmitTicket) {
        if self.send(PendingSubmission { delta, ticket }).is_err() {
            tracing::warn!(
                epoch = ticket.epoch,
                sequence = ticket.sequence,
                "Submission dropped: transport receiver closed"
            );
        }
    }
}
