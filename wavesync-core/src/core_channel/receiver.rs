//! Receiver side of the channel: who gets told what, in logical order

use crate::core_channel::status::ReturnStatus;
use crate::core_ops::{TransformedDelta, WaveletOperation};
use crate::core_version::VersionId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Consumer of the channel's ordered notifications.
///
/// Calls arrive synchronously from inside the channel. Implementations must
/// not call back into the channel.
pub trait DeltaReceiver: Send {
    /// The channel (re)connected at `last_modified_version`
    fn on_connection(
        &mut self,
        connect_version: &VersionId,
        last_modified_version: &VersionId,
        unacknowledged_delta_version: Option<&VersionId>,
        catch_up_ops: Option<&[WaveletOperation]>,
    );

    /// The outstanding submission was applied as `ops_applied` operations
    fn on_ack(&mut self, ops_applied: usize, version: &VersionId);

    /// The outstanding submission was rejected at `version`
    fn on_nack(&mut self, status: &ReturnStatus, version: u64);

    /// History up to `version` is durable on the server
    fn on_commit(&mut self, version: u64);

    /// A server delta, applied at the channel's expected version
    fn on_delta(&mut self, delta: &TransformedDelta);
}

/// One receiver notification, as recorded by [`RecordingReceiver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReceiverEvent {
    Connection {
        connect_version: VersionId,
        last_modified_version: VersionId,
        unacknowledged_delta_version: Option<VersionId>,
        catch_up_ops: Option<Vec<WaveletOperation>>,
    },
    Ack {
        ops_applied: usize,
        version: VersionId,
    },
    Nack {
        status: ReturnStatus,
        version: u64,
    },
    Commit {
        version: u64,
    },
    Delta {
        delta: TransformedDelta,
    },
}

impl ReceiverEvent {
    /// Short name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            ReceiverEvent::Connection { .. } => "connection",
            ReceiverEvent::Ack { .. } => "ack",
            ReceiverEvent::Nack { .. } => "nack",
            ReceiverEvent::Commit { .. } => "commit",
            ReceiverEvent::Delta { .. } => "delta",
        }
    }
}

/// Shared, append-only record of receiver events.
///
/// Cloning the log shares the underlying buffer, so a test can keep one
/// handle while the channel owns the receiver holding the other.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ReceiverEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: ReceiverEvent) {
        // A poisoned lock only means a test panicked mid-push; keep recording.
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    /// Copy of all events recorded so far
    pub fn snapshot(&self) -> Vec<ReceiverEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove and return all events recorded so far
    pub fn drain(&self) -> Vec<ReceiverEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiver that appends every notification to an [`EventLog`]
#[derive(Debug, Clone, Default)]
pub struct RecordingReceiver {
    log: EventLog,
}

impl RecordingReceiver {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

impl DeltaReceiver for RecordingReceiver {
    fn on_connection(
        &mut self,
        connect_version: &VersionId,
        last_modified_version: &VersionId,
        unacknowledged_delta_version: Option<&VersionId>,
        catch_up_ops: Option<&[WaveletOperation]>,
    ) {
        self.log.push(ReceiverEvent::Connection {
            connect_version: connect_version.clone(),
            last_modified_version: last_modified_version.clone(),
            unacknowledged_delta_version: unacknowledged_delta_version.cloned(),
            catch_up_ops: catch_up_ops.map(|ops| ops.to_vec()),
        });
    }

    fn on_ack(&mut self, ops_applied: usize, version: &VersionId) {
        self.log.push(ReceiverEvent::Ack {
            ops_applied,
            version: version.clone(),
        });
    }

    fn on_nack(&mut self, status: &ReturnStatus, version: u64) {
        self.log.push(ReceiverEvent::Nack {
            status: status.clone(),
            version,
        });
    }

    fn on_commit(&mut self, version: u64) {
        self.log.push(ReceiverEvent::Commit { version });
    }

    fn on_delta(&mut self, delta: &TransformedDelta) {
        self.log.push(ReceiverEvent::Delta {
            delta: delta.clone(),
        });
    }
}
