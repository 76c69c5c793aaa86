/*
    Channel ordering scenarios

    Each test drives a WaveletDeltaChannel over a QueuedTransport with a
    recording receiver and checks the exact notification order. Versions
    come from the shared fixtures, so the same sequence always carries the
    same integrity tag.
*/

use wavesync_core::core_channel::{
    ChannelError, ConnectionState, EventLog, QueuedTransport, ReceiverEvent, Recoverable,
    RecordingReceiver, ReturnCode, SubmitResponse, SubmitTicket, WaveletDeltaChannel,
};
use wavesync_core::core_session::WaveletMirror;
use wavesync_core::test_utils::{
    ack_event, assert_err, assert_fatal, assert_kinds, assert_ok, client_delta, commit_event,
    delta_event, insert_op, no_ops, server_delta, server_delta_with, version, TEST_TIMESTAMP,
};

fn connected(at: u64) -> (WaveletDeltaChannel<QueuedTransport>, EventLog) {
    let log = EventLog::new();
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(Some(Box::new(RecordingReceiver::new(log.clone()))));
    assert_ok(channel.on_connection(version(at), version(at), None, None, None));
    log.drain();
    (channel, log)
}

fn submit(channel: &mut WaveletDeltaChannel<QueuedTransport>, ops: usize) -> SubmitTicket {
    let target = channel
        .expected_version()
        .map(|v| v.sequence)
        .expect("channel is connected");
    assert_ok(channel.send(|| client_delta(target, ops)))
}

fn ack(ops_applied: usize, at: u64) -> SubmitResponse {
    SubmitResponse::ack(ops_applied, version(at), TEST_TIMESTAMP)
}

#[test]
fn test_connection_then_commit() {
    let log = EventLog::new();
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(Some(Box::new(RecordingReceiver::new(log.clone()))));

    assert_ok(channel.on_connection(version(50), version(57), Some(version(50)), None, None));

    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(channel.expected_version(), Some(&version(57)));
    assert_kinds(&log.snapshot(), &["connection", "commit"]);
    assert_eq!(log.snapshot()[1], commit_event(50));
}

#[test]
fn test_server_deltas_delivered_in_order() {
    let (mut channel, log) = connected(10);
    let first = server_delta(10, 2);
    let second = server_delta(12, 3);

    assert_ok(channel.on_wavelet_update(vec![first.clone(), second.clone()], None));

    assert_eq!(log.drain(), vec![delta_event(&first), delta_event(&second)]);
    assert_eq!(channel.expected_version(), Some(&version(15)));
}

#[test]
fn test_commit_precedes_deltas_of_same_update() {
    let (mut channel, log) = connected(10);

    assert_ok(channel.on_wavelet_update(
        vec![server_delta(10, 2), server_delta(12, 1)],
        Some(version(10)),
    ));

    assert_kinds(&log.drain(), &["commit", "delta", "delta"]);
}

#[test]
fn test_commit_within_update_follows_its_delta() {
    let (mut channel, log) = connected(10);

    assert_ok(channel.on_wavelet_update(vec![server_delta(10, 2)], Some(version(12))));

    let events = log.drain();
    assert_kinds(&events, &["delta", "commit"]);
    assert_eq!(events[1], commit_event(12));
}

#[test]
fn test_simple_ack() {
    let (mut channel, log) = connected(57);
    let ticket = submit(&mut channel, 5);

    assert_ok(channel.on_submit_response(ticket, ack(5, 62)));

    assert_eq!(log.drain(), vec![ack_event(5, version(62))]);
    assert!(!channel.has_outstanding());
    assert_eq!(channel.expected_version(), Some(&version(62)));
}

#[test]
fn test_late_ack_releases_queued_commit_and_delta() {
    let (mut channel, log) = connected(57);
    let ticket = submit(&mut channel, 5);
    let server = server_delta(62, 7);

    assert_ok(channel.on_wavelet_update(vec![server.clone()], Some(version(62))));
    assert!(log.is_empty());
    assert_eq!(channel.deferred_len(), 2);

    assert_ok(channel.on_submit_response(ticket, ack(5, 62)));

    assert_eq!(
        log.drain(),
        vec![ack_event(5, version(62)), commit_event(62), delta_event(&server)]
    );
    assert_eq!(channel.deferred_len(), 0);
    assert_eq!(channel.expected_version(), Some(&version(69)));
}

#[test]
fn test_server_delta_overtaking_ack_follows_it() {
    let (mut channel, log) = connected(57);
    let first = server_delta(57, 7);
    assert_ok(channel.on_wavelet_update(vec![first.clone()], None));

    let ticket = submit(&mut channel, 5);
    let second = server_delta(69, 3);
    assert_ok(channel.on_wavelet_update(vec![second.clone()], None));
    assert_ok(channel.on_submit_response(ticket, ack(5, 69)));

    assert_eq!(
        log.drain(),
        vec![
            delta_event(&first),
            ack_event(5, version(69)),
            delta_event(&second)
        ]
    );
    assert_eq!(channel.expected_version(), Some(&version(72)));
}

#[test]
fn test_send_before_connection_is_precondition() {
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    let err = assert_err(channel.send(|| client_delta(0, 1)));

    assert!(matches!(err, ChannelError::Precondition(_)));
    assert!(!err.is_fatal());
    assert_eq!(channel.transport().pending_len(), 0);
}

#[test]
fn test_early_ack_waits_for_preceding_delta() {
    let (mut channel, log) = connected(50);
    let ticket = submit(&mut channel, 2);

    assert_ok(channel.on_submit_response(ticket, ack(2, 54)));
    assert!(log.is_empty());

    let server = server_delta(50, 2);
    assert_ok(channel.on_wavelet_update(vec![server.clone()], None));

    assert_eq!(log.drain(), vec![delta_event(&server), ack_event(2, version(54))]);
    assert_eq!(channel.expected_version(), Some(&version(54)));
}

#[test]
fn test_shrunk_ack_leaving_gap_is_fatal() {
    let (mut channel, log) = connected(50);
    let ticket = submit(&mut channel, 3);

    assert_ok(channel.on_wavelet_update(vec![server_delta(53, 2)], None));

    // The server applied only two of three ops; nothing covers version 52.
    let err = assert_err(channel.on_submit_response(ticket, ack(2, 52)));
    assert_eq!(
        err,
        ChannelError::Gap {
            expected: 52,
            applied_at: 53
        }
    );
    assert_fatal(&err);
    assert_kinds(&log.drain(), &["ack"]);
    assert!(channel.is_failed());
}

#[test]
fn test_gap_drops_early_commit() {
    let (mut channel, log) = connected(10);

    let err =
        assert_err(channel.on_wavelet_update(vec![server_delta(12, 1)], Some(version(10))));

    assert_eq!(
        err,
        ChannelError::Gap {
            expected: 10,
            applied_at: 12
        }
    );
    assert!(log.is_empty());
    assert_eq!(
        channel.on_wavelet_update(Vec::new(), Some(version(10))),
        Err(ChannelError::Failed)
    );
    assert!(log.is_empty());
}

#[test]
fn test_delta_beyond_outstanding_ops_is_gap() {
    let (mut channel, _log) = connected(10);
    submit(&mut channel, 1);

    let err = assert_err(channel.on_wavelet_update(vec![server_delta(13, 1)], None));
    assert!(matches!(
        err,
        ChannelError::Gap {
            expected: 10,
            applied_at: 13
        }
    ));
}

#[test]
fn test_ack_for_already_received_delta_is_fatal() {
    let (mut channel, _log) = connected(10);
    let ticket = submit(&mut channel, 2);

    assert_ok(channel.on_wavelet_update(vec![server_delta(10, 2)], None));
    let err = assert_err(channel.on_submit_response(ticket, ack(2, 12)));

    assert_eq!(
        err,
        ChannelError::AckForReceivedDelta {
            ack_start: 10,
            expected: 12
        }
    );
}

#[test]
fn test_reflected_delta_after_ack_is_fatal() {
    let (mut channel, log) = connected(10);
    let ticket = submit(&mut channel, 2);
    assert_ok(channel.on_submit_response(ticket, ack(2, 12)));
    log.drain();

    let err = assert_err(channel.on_wavelet_update(vec![server_delta(10, 2)], None));
    assert_eq!(
        err,
        ChannelError::ReflectedDelta {
            applied_at: 10,
            resulting: 12
        }
    );
    assert!(log.is_empty());
}

#[test]
fn test_nack_delivered_in_order() {
    let (mut channel, log) = connected(10);
    let ticket = submit(&mut channel, 1);

    let response = SubmitResponse::nack(version(12), ReturnCode::BadRequest, "malformed");
    assert_ok(channel.on_submit_response(ticket, response));
    assert!(log.is_empty());

    let server = server_delta(10, 2);
    assert_ok(channel.on_wavelet_update(vec![server.clone()], None));

    let events = log.drain();
    assert_kinds(&events, &["delta", "nack"]);
    match &events[1] {
        ReceiverEvent::Nack { status, version } => {
            assert_eq!(status.code, ReturnCode::BadRequest);
            assert_eq!(*version, 12);
        }
        other => panic!("expected nack, got {:?}", other),
    }
    assert!(!channel.has_outstanding());
}

#[test]
fn test_recoverable_nack_reports_without_failing() {
    let (mut channel, log) = connected(10);
    let ticket = submit(&mut channel, 1);

    let response = SubmitResponse::nack(version(10), ReturnCode::TooOld, "rebase needed");
    let err = assert_err(channel.on_submit_response(ticket, response));

    assert_eq!(err.recoverable(), Recoverable::Recoverable);
    assert!(!err.is_fatal());
    assert!(log.is_empty());
    assert!(!channel.is_failed());

    let ticket = submit(&mut channel, 1);
    assert_ok(channel.on_submit_response(ticket, ack(1, 11)));
    assert_kinds(&log.drain(), &["ack"]);
}

#[test]
fn test_recoverable_nack_with_deferred_delta_is_gap() {
    let (mut channel, log) = connected(64);
    let ticket = submit(&mut channel, 5);

    assert_ok(channel.on_wavelet_update(vec![server_delta(69, 3)], None));
    assert_eq!(channel.deferred_len(), 1);

    // Nothing applied versions 64..69 once the submission is rejected.
    let response = SubmitResponse::nack(version(64), ReturnCode::TooOld, "rebase needed");
    let err = assert_err(channel.on_submit_response(ticket, response));

    assert_eq!(
        err,
        ChannelError::Gap {
            expected: 64,
            applied_at: 69
        }
    );
    assert_fatal(&err);
    assert!(channel.is_failed());
    assert_eq!(channel.deferred_len(), 0);
    assert!(log.is_empty());
    assert!(matches!(
        channel.send(|| client_delta(64, 1)),
        Err(ChannelError::Precondition(_))
    ));
}

#[test]
fn test_recoverable_nack_releases_deferred_commit() {
    let (mut channel, log) = connected(64);
    let ticket = submit(&mut channel, 5);

    assert_ok(channel.on_wavelet_update(Vec::new(), Some(version(66))));
    assert_eq!(channel.deferred_len(), 1);

    let response = SubmitResponse::nack(version(64), ReturnCode::TooOld, "rebase needed");
    let err = assert_err(channel.on_submit_response(ticket, response));

    assert_eq!(err.recoverable(), Recoverable::Recoverable);
    assert!(!channel.is_failed());
    assert_eq!(log.drain(), vec![commit_event(66)]);
    assert_eq!(channel.deferred_len(), 0);
    assert_eq!(channel.expected_version(), Some(&version(64)));
}

#[test]
fn test_reconnect_with_catch_up_ops() {
    let log = EventLog::new();
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(Some(Box::new(RecordingReceiver::new(log.clone()))));

    assert_ok(channel.on_connection(
        version(50),
        version(57),
        Some(version(50)),
        Some(version(57)),
        Some(no_ops(7)),
    ));

    let events = log.drain();
    assert_kinds(&events, &["connection", "commit"]);
    match &events[0] {
        ReceiverEvent::Connection {
            unacknowledged_delta_version,
            catch_up_ops,
            ..
        } => {
            assert_eq!(unacknowledged_delta_version.as_ref(), Some(&version(57)));
            assert_eq!(catch_up_ops.as_ref().map(Vec::len), Some(7));
        }
        other => panic!("expected connection, got {:?}", other),
    }

    let next = server_delta(57, 1);
    assert_ok(channel.on_wavelet_update(vec![next.clone()], None));
    assert_eq!(log.drain(), vec![delta_event(&next)]);
}

#[test]
fn test_recovered_submission_echo_is_fatal() {
    let (mut channel, _log) = connected(0);
    channel.reset(None);
    assert_ok(channel.on_connection(
        version(50),
        version(57),
        None,
        Some(version(57)),
        Some(no_ops(7)),
    ));

    let err = assert_err(channel.on_wavelet_update(vec![server_delta(50, 7)], None));
    assert!(matches!(
        err,
        ChannelError::ReflectedDelta {
            applied_at: 50,
            resulting: 57
        }
    ));
}

#[test]
fn test_response_from_previous_epoch_is_ignored() {
    let (mut channel, log) = connected(5);
    let stale = submit(&mut channel, 1);

    channel.reset(Some(Box::new(RecordingReceiver::new(log.clone()))));
    assert_ok(channel.on_connection(version(5), version(5), None, None, None));
    log.drain();

    assert_ok(channel.on_submit_response(stale, ack(1, 6)));

    assert!(log.is_empty());
    assert_eq!(channel.stats().stale_responses, 1);
    assert_eq!(channel.expected_version(), Some(&version(5)));
}

#[test]
fn test_mirror_follows_channel() {
    let mirror = WaveletMirror::new();
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(Some(Box::new(mirror.clone())));
    assert_ok(channel.on_connection(version(3), version(3), None, None, None));
    assert!(mirror.is_live());

    let hello = server_delta_with(3, vec![insert_op("b+1", 0, 0, "hello")]);
    let world = server_delta_with(4, vec![insert_op("b+1", 5, 5, " world")]);
    assert_ok(channel.on_wavelet_update(vec![hello, world], Some(version(4))));

    let state = mirror.state();
    assert_eq!(state.blip("b+1").map(|b| b.content.as_str()), Some("hello world"));
    assert_eq!(mirror.version(), Some(version(5)));
    assert_eq!(mirror.last_committed(), Some(4));
    assert_eq!(mirror.undo_depth(), 2);

    let ticket = submit(&mut channel, 2);
    assert_ok(channel.on_submit_response(ticket, ack(2, 7)));
    assert_eq!(mirror.last_acked(), Some(version(7)));
    assert_eq!(mirror.version(), Some(version(7)));
    assert!(mirror.errors().is_empty());
}
