//! Deferred queue: server input held back until the outstanding submission
//! resolves.

use super::errors::{ChannelError, ChannelResult};
use super::status::ReturnStatus;
use crate::core_ops::TransformedDelta;
use crate::core_version::VersionId;
use std::collections::VecDeque;

/// An item waiting for its logical turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedEvent {
    Delta(TransformedDelta),
    Commit(u64),
    Ack { ops_applied: usize, version: VersionId },
    Nack { status: ReturnStatus, version: VersionId },
}

impl QueuedEvent {
    /// Version at which the event takes effect. Commits have none: they are
    /// released as soon as the channel reaches them.
    pub fn start(&self) -> Option<u64> {
        match self {
            QueuedEvent::Delta(delta) => Some(delta.applied_at_version().sequence),
            QueuedEvent::Commit(_) => None,
            QueuedEvent::Ack {
                ops_applied,
                version,
            } => Some(version.sequence.saturating_sub(*ops_applied as u64)),
            QueuedEvent::Nack { version, .. } => Some(version.sequence),
        }
    }

    fn is_response(&self) -> bool {
        matches!(self, QueuedEvent::Ack { .. } | QueuedEvent::Nack { .. })
    }
}

/// Bounded, receipt-ordered buffer of deferred events
#[derive(Debug, Clone)]
pub struct DeferredQueue {
    entries: VecDeque<QueuedEvent>,
    capacity: usize,
    peak: usize,
}

impl DeferredQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            peak: 0,
        }
    }

    pub fn push(&mut self, event: QueuedEvent) -> ChannelResult<()> {
        if self.entries.len() >= self.capacity {
            return Err(ChannelError::Protocol(format!(
                "deferred queue full ({} entries)",
                self.capacity
            )));
        }
        self.entries.push_back(event);
        self.peak = self.peak.max(self.entries.len());
        Ok(())
    }

    /// Remove the earliest-received commit at or below `version`
    pub fn take_commit_at_or_below(&mut self, version: u64) -> Option<u64> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, QueuedEvent::Commit(v) if *v <= version))?;
        match self.entries.remove(index) {
            Some(QueuedEvent::Commit(v)) => Some(v),
            _ => None,
        }
    }

    /// Remove the earliest-received commit regardless of version
    pub fn pop_commit(&mut self) -> Option<u64> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, QueuedEvent::Commit(_)))?;
        match self.entries.remove(index) {
            Some(QueuedEvent::Commit(v)) => Some(v),
            _ => None,
        }
    }

    fn next_index(&self) -> Option<usize> {
        // Lowest start wins; at equal start a response goes before a delta,
        // since the submission sits between the two in history.
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.start().map(|s| (s, !e.is_response(), i)))
            .min()
            .map(|(_, _, i)| i)
    }

    /// Start version of the next non-commit event in logical order
    pub fn next_start(&self) -> Option<u64> {
        self.next_index()
            .and_then(|i| self.entries.get(i))
            .and_then(QueuedEvent::start)
    }

    /// Remove the next non-commit event in logical order
    pub fn pop_next(&mut self) -> Option<QueuedEvent> {
        let index = self.next_index()?;
        self.entries.remove(index)
    }

    /// Most recently queued server delta
    pub fn last_delta(&self) -> Option<&TransformedDelta> {
        self.entries.iter().rev().find_map(|e| match e {
            QueuedEvent::Delta(delta) => Some(delta),
            _ => None,
        })
    }

    pub fn has_deltas(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, QueuedEvent::Delta(_)))
    }

    /// Version range `[start, end)` of a queued early ack
    pub fn queued_ack_range(&self) -> Option<(u64, u64)> {
        self.entries.iter().find_map(|e| match e {
            QueuedEvent::Ack { version, .. } => e.start().map(|s| (s, version.sequence)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest number of entries held at once since creation
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_channel::status::ReturnCode;
    use crate::test_utils::fixtures::server_delta;

    #[test]
    fn test_response_wins_tie_with_delta() {
        let mut queue = DeferredQueue::new(8);
        queue.push(QueuedEvent::Delta(server_delta(69, 3))).unwrap();
        queue
            .push(QueuedEvent::Ack {
                ops_applied: 0,
                version: VersionId::unsigned(69),
            })
            .unwrap();

        assert_eq!(queue.next_start(), Some(69));
        assert!(matches!(queue.pop_next(), Some(QueuedEvent::Ack { .. })));
        assert!(matches!(queue.pop_next(), Some(QueuedEvent::Delta(_))));
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn test_lowest_start_first() {
        let mut queue = DeferredQueue::new(8);
        queue.push(QueuedEvent::Delta(server_delta(72, 1))).unwrap();
        queue
            .push(QueuedEvent::Nack {
                status: ReturnStatus::new(ReturnCode::BadRequest, "bad"),
                version: VersionId::unsigned(64),
            })
            .unwrap();

        assert_eq!(queue.next_start(), Some(64));
        assert_eq!(queue.last_delta().map(|d| d.applied_at_version().sequence), Some(72));
    }

    #[test]
    fn test_commits_released_in_receipt_order() {
        let mut queue = DeferredQueue::new(8);
        queue.push(QueuedEvent::Commit(69)).unwrap();
        queue.push(QueuedEvent::Commit(60)).unwrap();
        queue.push(QueuedEvent::Commit(80)).unwrap();

        assert_eq!(queue.take_commit_at_or_below(70), Some(69));
        assert_eq!(queue.take_commit_at_or_below(70), Some(60));
        assert_eq!(queue.take_commit_at_or_below(70), None);
        assert_eq!(queue.next_start(), None);
        assert_eq!(queue.pop_commit(), Some(80));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut queue = DeferredQueue::new(2);
        queue.push(QueuedEvent::Commit(1)).unwrap();
        queue.push(QueuedEvent::Commit(2)).unwrap();

        let err = queue.push(QueuedEvent::Commit(3)).unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(_)));
        assert_eq!(queue.peak(), 2);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.peak(), 2);
    }

    #[test]
    fn test_queued_ack_range() {
        let mut queue = DeferredQueue::new(4);
        assert_eq!(queue.queued_ack_range(), None);
        queue
            .push(QueuedEvent::Ack {
                ops_applied: 5,
                version: VersionId::unsigned(69),
            })
            .unwrap();
        assert_eq!(queue.queued_ack_range(), Some((64, 69)));
    }
}
