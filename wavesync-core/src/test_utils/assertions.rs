//! Assertion helpers for channel tests

use crate::core_channel::{ChannelError, ReceiverEvent, Recoverable};
use crate::core_ops::TransformedDelta;
use crate::core_version::VersionId;
use std::fmt::Debug;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that a Result is Err and return the error
pub fn assert_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
        Err(e) => e,
    }
}

/// Assert that an error ends the channel
pub fn assert_fatal(error: &ChannelError) {
    assert!(error.is_fatal(), "Expected a fatal error, got {:?}", error);
    assert_eq!(error.recoverable(), Recoverable::NotRecoverable);
}

/// Assert the exact kinds of a recorded event stream, e.g.
/// `["delta", "ack", "commit"]`
pub fn assert_kinds(events: &[ReceiverEvent], expected: &[&str]) {
    let kinds: Vec<&str> = events.iter().map(ReceiverEvent::kind).collect();
    assert_eq!(kinds, expected, "Unexpected event kinds. Events: {:?}", events);
}

pub fn delta_event(delta: &TransformedDelta) -> ReceiverEvent {
    ReceiverEvent::Delta {
        delta: delta.clone(),
    }
}

pub fn ack_event(ops_applied: usize, version: VersionId) -> ReceiverEvent {
    ReceiverEvent::Ack {
        ops_applied,
        version,
    }
}

pub fn commit_event(version: u64) -> ReceiverEvent {
    ReceiverEvent::Commit { version }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_kinds() {
        assert_kinds(&[commit_event(3), ack_event(1, VersionId::unsigned(4))], &["commit", "ack"]);
    }

    #[test]
    #[should_panic(expected = "Expected a fatal error")]
    fn test_assert_fatal_rejects_precondition() {
        assert_fatal(&ChannelError::Precondition("x".into()));
    }
}
