//! The delta synchronization channel state machine
//!
//! The channel owns a single submission slot and the client's notion of the
//! next expected version. Server deltas, commit notices and submission
//! responses may arrive in any relative order; the channel re-sequences them
//! so the receiver observes them in version order, and fails hard on any
//! contiguity violation.

use super::errors::{ChannelError, ChannelResult};
use super::queue::{DeferredQueue, QueuedEvent};
use super::receiver::DeltaReceiver;
use super::status::{NackClassifier, Recoverable, ReturnStatus};
use super::transport::{SubmitResponse, SubmitTicket, WaveletTransport};
use crate::config::ChannelConfig;
use crate::core_ops::{ClientDelta, TransformedDelta, WaveletOperation};
use crate::core_version::VersionId;
use crate::metrics::{self as channel_metrics, record_counter, record_gauge};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Connection state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Disconnected,
    Connected,
    /// A fatal error was raised; only `reset` leaves this phase
    Failed,
}

/// Delivery counters, kept per channel instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub deltas_delivered: u64,
    pub acks_delivered: u64,
    pub nacks_delivered: u64,
    pub commits_delivered: u64,
    pub stale_responses: u64,
    pub peak_deferred: usize,
}

#[derive(Debug, Clone)]
struct OutstandingSubmission {
    delta: ClientDelta,
    ticket: SubmitTicket,
    /// An early ack or nack for it sits in the deferred queue
    responded: bool,
}

/// Half-open version range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VersionRange {
    start: u64,
    end: u64,
}

impl VersionRange {
    fn of(delta: &TransformedDelta) -> Self {
        Self {
            start: delta.applied_at_version().sequence,
            end: delta.resulting_version().sequence,
        }
    }
}

/// Client side of one wavelet's delta stream
pub struct WaveletDeltaChannel<T: WaveletTransport> {
    transport: T,
    receiver: Option<Box<dyn DeltaReceiver>>,
    classifier: NackClassifier,
    phase: Phase,
    epoch: u64,
    next_sequence: u64,
    expected: VersionId,
    outstanding: Option<OutstandingSubmission>,
    /// Range covered by the most recent ack in this epoch
    last_ack: Option<VersionRange>,
    /// Range of a submission the server applied before the last disconnect
    recovered: Option<VersionRange>,
    deferred: DeferredQueue,
    /// Commit already reached when an update arrived; goes out before the
    /// first delivery of that update, or is dropped if the update fails
    early_commit: Option<u64>,
    stats: ChannelStats,
}

impl<T: WaveletTransport> WaveletDeltaChannel<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &ChannelConfig::default())
    }

    pub fn with_config(transport: T, config: &ChannelConfig) -> Self {
        Self {
            transport,
            receiver: None,
            classifier: NackClassifier::new(config.recoverable_codes.iter().copied()),
            phase: Phase::Disconnected,
            epoch: 0,
            next_sequence: 0,
            expected: VersionId::unsigned(0),
            outstanding: None,
            last_ack: None,
            recovered: None,
            deferred: DeferredQueue::new(config.max_deferred),
            early_commit: None,
            stats: ChannelStats::default(),
        }
    }

    /// Drop all session state and start a new epoch.
    ///
    /// The previous receiver is detached without being told. `receiver`
    /// will get the notifications of the next connection.
    pub fn reset(&mut self, receiver: Option<Box<dyn DeltaReceiver>>) {
        self.epoch += 1;
        self.phase = Phase::Disconnected;
        self.next_sequence = 0;
        self.expected = VersionId::unsigned(0);
        self.clear_session();
        self.receiver = receiver;
        record_gauge(channel_metrics::CHANNEL_DEFERRED_DEPTH, 0.0);
        debug!(epoch = self.epoch, "Channel reset");
    }

    /// The transport (re)connected the wavelet.
    ///
    /// `unacknowledged_delta_version` and `catch_up_ops` describe a delta this
    /// client submitted before the disconnect that the server did apply.
    pub fn on_connection(
        &mut self,
        connect_version: VersionId,
        last_modified_version: VersionId,
        committed_version: Option<VersionId>,
        unacknowledged_delta_version: Option<VersionId>,
        catch_up_ops: Option<Vec<WaveletOperation>>,
    ) -> ChannelResult<()> {
        match self.phase {
            Phase::Failed => return Err(ChannelError::Failed),
            Phase::Connected => {
                return self.settle(Err(ChannelError::Protocol(
                    "connection notice on an already connected channel".to_string(),
                )))
            }
            Phase::Disconnected => {}
        }

        if connect_version.sequence > last_modified_version.sequence {
            return self.settle(Err(ChannelError::Protocol(format!(
                "connect version {} is beyond last modified version {}",
                connect_version, last_modified_version
            ))));
        }

        self.phase = Phase::Connected;
        self.expected = last_modified_version.clone();
        self.recovered = unacknowledged_delta_version.as_ref().map(|version| {
            let ops = catch_up_ops.as_ref().map_or(0, Vec::len) as u64;
            VersionRange {
                start: version.sequence.saturating_sub(ops),
                end: version.sequence,
            }
        });

        info!(
            epoch = self.epoch,
            connect = %connect_version,
            expected = %last_modified_version,
            "Channel connected"
        );
        record_counter(channel_metrics::CHANNEL_CONNECTIONS, 1);

        if let Some(receiver) = self.receiver.as_mut() {
            receiver.on_connection(
                &connect_version,
                &last_modified_version,
                unacknowledged_delta_version.as_ref(),
                catch_up_ops.as_deref(),
            );
        }
        if let Some(committed) = committed_version {
            self.deliver_commit(committed.sequence);
        }
        Ok(())
    }

    /// Take a delta from `transmitter` and submit it.
    ///
    /// The transmitter is only invoked once the preconditions hold: the
    /// channel is connected and no other submission is outstanding.
    pub fn send<F>(&mut self, transmitter: F) -> ChannelResult<SubmitTicket>
    where
        F: FnOnce() -> ClientDelta,
    {
        if self.phase != Phase::Connected {
            return Err(ChannelError::Precondition(
                "send on a channel that is not connected".to_string(),
            ));
        }
        if let Some(outstanding) = &self.outstanding {
            return Err(ChannelError::Precondition(format!(
                "submission {} is still outstanding",
                outstanding.ticket.sequence
            )));
        }

        let delta = transmitter();
        let ticket = SubmitTicket {
            epoch: self.epoch,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        debug!(
            epoch = ticket.epoch,
            sequence = ticket.sequence,
            target = %delta.target_version,
            ops = delta.len(),
            "Submitting delta"
        );
        record_counter(channel_metrics::CHANNEL_SUBMISSIONS, 1);

        self.outstanding = Some(OutstandingSubmission {
            delta: delta.clone(),
            ticket,
            responded: false,
        });
        self.transport.submit(delta, ticket);
        Ok(ticket)
    }

    /// Server push: zero or more deltas plus an optional commit notice
    pub fn on_wavelet_update(
        &mut self,
        deltas: Vec<TransformedDelta>,
        committed_version: Option<VersionId>,
    ) -> ChannelResult<()> {
        match self.phase {
            Phase::Failed => return Err(ChannelError::Failed),
            Phase::Disconnected => {
                debug!(
                    epoch = self.epoch,
                    deltas = deltas.len(),
                    "Dropping update on disconnected channel"
                );
                return Ok(());
            }
            Phase::Connected => {}
        }

        let result = self.ingest_update(deltas, committed_version);
        self.settle(result)
    }

    /// Answer to the submission identified by `ticket`
    pub fn on_submit_response(
        &mut self,
        ticket: SubmitTicket,
        response: SubmitResponse,
    ) -> ChannelResult<()> {
        if ticket.epoch != self.epoch {
            self.stats.stale_responses += 1;
            record_counter(channel_metrics::CHANNEL_STALE_RESPONSES, 1);
            warn!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "Dropping response from a previous connection"
            );
            return Ok(());
        }

        match self.phase {
            Phase::Failed => return Err(ChannelError::Failed),
            Phase::Disconnected => {
                debug!(epoch = self.epoch, "Dropping response on disconnected channel");
                return Ok(());
            }
            Phase::Connected => {}
        }

        let result = self.ingest_response(ticket, response);
        self.settle(result)
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Connected => ConnectionState::Connected,
            Phase::Disconnected | Phase::Failed => ConnectionState::Disconnected,
        }
    }

    /// Whether a fatal error is pending a `reset`
    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Next version the channel expects to observe, while connected
    pub fn expected_version(&self) -> Option<&VersionId> {
        match self.phase {
            Phase::Connected => Some(&self.expected),
            _ => None,
        }
    }

    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn outstanding_ticket(&self) -> Option<SubmitTicket> {
        self.outstanding.as_ref().map(|o| o.ticket)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn has_receiver(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ---- ingest ----

    fn ingest_update(
        &mut self,
        deltas: Vec<TransformedDelta>,
        committed_version: Option<VersionId>,
    ) -> ChannelResult<()> {
        let mut late_commit = None;
        if let Some(committed) = committed_version {
            if committed.sequence <= self.expected.sequence {
                self.early_commit = Some(committed.sequence);
            } else {
                late_commit = Some(committed.sequence);
            }
        }

        for delta in deltas {
            self.ingest_delta(delta)?;
        }
        self.release_early_commit();

        if let Some(version) = late_commit {
            self.ingest_commit(version)?;
        }
        Ok(())
    }

    fn ingest_delta(&mut self, delta: TransformedDelta) -> ChannelResult<()> {
        let range = VersionRange::of(&delta);
        let expected = self.expected.sequence;

        if range.start < range.end
            && (self.last_ack == Some(range) || self.recovered == Some(range))
        {
            return Err(ChannelError::ReflectedDelta {
                applied_at: range.start,
                resulting: range.end,
            });
        }

        if range.start < expected {
            return Err(ChannelError::Gap {
                expected,
                applied_at: range.start,
            });
        }
        if range.start > expected {
            return self.defer_delta(delta);
        }

        if let Some(last) = self.deferred.last_delta() {
            // The server stream is ordered: nothing may precede a queued delta.
            return Err(ChannelError::Gap {
                expected: last.resulting_version().sequence,
                applied_at: range.start,
            });
        }
        if let Some((ack_start, ack_end)) = self.deferred.queued_ack_range() {
            if range.start < ack_end && ack_start < range.end {
                return Err(ChannelError::Protocol(format!(
                    "server delta {}..{} overlaps acknowledged submission {}..{}",
                    range.start, range.end, ack_start, ack_end
                )));
            }
        }
        if self.expected.conflicts_with(delta.applied_at_version()) {
            return Err(ChannelError::IntegrityMismatch {
                sequence: range.start,
            });
        }

        self.deliver_delta(delta);
        self.flush()
    }

    fn defer_delta(&mut self, delta: TransformedDelta) -> ChannelResult<()> {
        let applied_at = delta.applied_at_version().sequence;
        let expected = self.expected.sequence;

        // Only our own unanswered submission can account for missing versions.
        let Some(outstanding) = self.outstanding.as_ref().filter(|o| !o.responded) else {
            return Err(ChannelError::Gap {
                expected,
                applied_at,
            });
        };

        if let Some(last) = self.deferred.last_delta() {
            let chained = last.resulting_version();
            if chained.sequence != applied_at {
                return Err(ChannelError::Gap {
                    expected: chained.sequence,
                    applied_at,
                });
            }
            if chained.conflicts_with(delta.applied_at_version()) {
                return Err(ChannelError::IntegrityMismatch {
                    sequence: applied_at,
                });
            }
        } else if applied_at - expected > outstanding.delta.len() as u64 {
            return Err(ChannelError::Gap {
                expected,
                applied_at,
            });
        }

        debug!(
            epoch = self.epoch,
            expected,
            applied_at,
            "Deferring server delta until submission resolves"
        );
        self.defer(QueuedEvent::Delta(delta))
    }

    fn ingest_commit(&mut self, version: u64) -> ChannelResult<()> {
        if version <= self.expected.sequence {
            self.deliver_commit(version);
        } else if self.outstanding.is_some() || !self.deferred.is_empty() {
            debug!(epoch = self.epoch, version, "Deferring commit notice");
            self.defer(QueuedEvent::Commit(version))?;
        } else {
            warn!(
                epoch = self.epoch,
                version,
                expected = self.expected.sequence,
                "Commit notice beyond expected version"
            );
            self.deliver_commit(version);
        }
        Ok(())
    }

    fn ingest_response(
        &mut self,
        ticket: SubmitTicket,
        response: SubmitResponse,
    ) -> ChannelResult<()> {
        let submitted = match &self.outstanding {
            Some(o) if o.ticket == ticket && !o.responded => o.delta.len(),
            Some(o) if o.ticket == ticket => {
                return Err(ChannelError::Protocol(format!(
                    "duplicate response for submission {}",
                    ticket.sequence
                )))
            }
            _ => {
                return Err(ChannelError::Protocol(format!(
                    "response for unknown submission {}",
                    ticket.sequence
                )))
            }
        };

        if response.status.is_ok() {
            self.ingest_ack(submitted, response)
        } else {
            self.ingest_nack(response)
        }
    }

    fn ingest_ack(&mut self, submitted: usize, response: SubmitResponse) -> ChannelResult<()> {
        let SubmitResponse {
            ops_applied,
            version,
            ..
        } = response;

        if ops_applied > submitted {
            return Err(ChannelError::Protocol(format!(
                "ack for {} operations but {} were submitted",
                ops_applied, submitted
            )));
        }
        let start = version
            .sequence
            .checked_sub(ops_applied as u64)
            .ok_or_else(|| {
                ChannelError::Protocol(format!(
                    "ack for {} operations at version {}",
                    ops_applied, version
                ))
            })?;

        let expected = self.expected.sequence;
        if start < expected {
            return Err(ChannelError::AckForReceivedDelta {
                ack_start: start,
                expected,
            });
        }
        if start == expected {
            self.deliver_ack(ops_applied, version);
            return self.flush();
        }

        if let Some(next) = self.deferred.next_start() {
            // Server deltas ahead of the ack would have to precede it.
            return Err(ChannelError::Gap {
                expected,
                applied_at: next,
            });
        }
        debug!(
            epoch = self.epoch,
            expected,
            ack_start = start,
            "Deferring early ack"
        );
        self.mark_responded();
        self.defer(QueuedEvent::Ack {
            ops_applied,
            version,
        })
    }

    fn ingest_nack(&mut self, response: SubmitResponse) -> ChannelResult<()> {
        let SubmitResponse {
            status, version, ..
        } = response;

        let recoverable = self.classifier.classify(status.code);
        if recoverable == Recoverable::Recoverable {
            self.outstanding = None;
            warn!(
                epoch = self.epoch,
                code = %status.code,
                "Submission rejected; resynchronization required"
            );
            record_counter(channel_metrics::CHANNEL_RECOVERABLE_NACKS, 1);
            // Deltas held back for the submission can no longer be explained.
            self.flush()?;
            return Err(ChannelError::Nack {
                status,
                recoverable,
            });
        }

        let expected = self.expected.sequence;
        if version.sequence <= expected {
            self.deliver_nack(status, version.sequence);
            return self.flush();
        }

        if let Some(next) = self.deferred.next_start() {
            return Err(ChannelError::Gap {
                expected,
                applied_at: next,
            });
        }
        debug!(
            epoch = self.epoch,
            expected,
            nack_version = version.sequence,
            "Deferring early nack"
        );
        self.mark_responded();
        self.defer(QueuedEvent::Nack { status, version })
    }

    /// Release everything in the deferred queue that has become deliverable
    fn flush(&mut self) -> ChannelResult<()> {
        loop {
            while let Some(commit) = self.deferred.take_commit_at_or_below(self.expected.sequence) {
                self.deliver_commit(commit);
            }

            let Some(start) = self.deferred.next_start() else {
                break;
            };
            let expected = self.expected.sequence;

            if start > expected {
                match &self.outstanding {
                    Some(o) if !o.responded => {
                        if start - expected > o.delta.len() as u64 {
                            return Err(ChannelError::Gap {
                                expected,
                                applied_at: start,
                            });
                        }
                    }
                    Some(_) => {}
                    None => {
                        return Err(ChannelError::Gap {
                            expected,
                            applied_at: start,
                        })
                    }
                }
                break;
            }

            let Some(event) = self.deferred.pop_next() else {
                break;
            };
            match event {
                QueuedEvent::Delta(delta) => {
                    if start < expected {
                        return Err(ChannelError::Gap {
                            expected,
                            applied_at: start,
                        });
                    }
                    if self.expected.conflicts_with(delta.applied_at_version()) {
                        return Err(ChannelError::IntegrityMismatch { sequence: start });
                    }
                    self.deliver_delta(delta);
                }
                QueuedEvent::Ack {
                    ops_applied,
                    version,
                } => {
                    if start < expected {
                        return Err(ChannelError::AckForReceivedDelta {
                            ack_start: start,
                            expected,
                        });
                    }
                    self.deliver_ack(ops_applied, version);
                }
                QueuedEvent::Nack { status, version } => {
                    self.deliver_nack(status, version.sequence);
                }
                QueuedEvent::Commit(version) => self.deliver_commit(version),
            }
        }

        if self.outstanding.is_none() {
            while let Some(commit) = self.deferred.pop_commit() {
                warn!(
                    epoch = self.epoch,
                    version = commit,
                    expected = self.expected.sequence,
                    "Releasing commit notice beyond expected version"
                );
                self.deliver_commit(commit);
            }
        }
        record_gauge(
            channel_metrics::CHANNEL_DEFERRED_DEPTH,
            self.deferred.len() as f64,
        );
        Ok(())
    }

    fn defer(&mut self, event: QueuedEvent) -> ChannelResult<()> {
        self.deferred.push(event)?;
        self.stats.peak_deferred = self.deferred.peak();
        record_gauge(
            channel_metrics::CHANNEL_DEFERRED_DEPTH,
            self.deferred.len() as f64,
        );
        Ok(())
    }

    fn mark_responded(&mut self) {
        if let Some(outstanding) = self.outstanding.as_mut() {
            outstanding.responded = true;
        }
    }

    // ---- delivery ----

    fn release_early_commit(&mut self) {
        if let Some(version) = self.early_commit.take() {
            self.deliver_commit(version);
        }
    }

    fn deliver_delta(&mut self, delta: TransformedDelta) {
        self.release_early_commit();
        self.expected = delta.resulting_version().clone();
        self.stats.deltas_delivered += 1;
        record_counter(channel_metrics::CHANNEL_DELTAS_DELIVERED, 1);
        debug!(
            epoch = self.epoch,
            applied_at = delta.applied_at_version().sequence,
            expected = self.expected.sequence,
            "Delivering server delta"
        );
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.on_delta(&delta);
        }
    }

    fn deliver_ack(&mut self, ops_applied: usize, version: VersionId) {
        self.release_early_commit();
        self.outstanding = None;
        self.last_ack = Some(VersionRange {
            start: version.sequence - ops_applied as u64,
            end: version.sequence,
        });
        self.expected = version.clone();
        self.stats.acks_delivered += 1;
        record_counter(channel_metrics::CHANNEL_ACKS_DELIVERED, 1);
        debug!(
            epoch = self.epoch,
            ops_applied,
            expected = self.expected.sequence,
            "Delivering ack"
        );
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.on_ack(ops_applied, &version);
        }
    }

    fn deliver_nack(&mut self, status: ReturnStatus, version: u64) {
        self.release_early_commit();
        self.outstanding = None;
        self.stats.nacks_delivered += 1;
        record_counter(channel_metrics::CHANNEL_NACKS_DELIVERED, 1);
        debug!(epoch = self.epoch, version, code = %status.code, "Delivering nack");
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.on_nack(&status, version);
        }
    }

    fn deliver_commit(&mut self, version: u64) {
        self.release_early_commit();
        self.stats.commits_delivered += 1;
        record_counter(channel_metrics::CHANNEL_COMMITS_DELIVERED, 1);
        if let Some(receiver) = self.receiver.as_mut() {
            receiver.on_commit(version);
        }
    }

    // ---- failure ----

    fn settle(&mut self, result: ChannelResult<()>) -> ChannelResult<()> {
        if let Err(err) = &result {
            self.early_commit = None;
            if err.is_fatal() {
                error!(
                    epoch = self.epoch,
                    expected = self.expected.sequence,
                    error = %err,
                    "Channel failed"
                );
                record_counter(channel_metrics::CHANNEL_FAILURES, 1);
                self.phase = Phase::Failed;
                self.clear_session();
            }
        }
        result
    }

    fn clear_session(&mut self) {
        self.outstanding = None;
        self.last_ack = None;
        self.recovered = None;
        self.deferred.clear();
        self.early_commit = None;
    }
}
