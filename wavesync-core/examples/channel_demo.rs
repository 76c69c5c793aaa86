//! Example: a channel feeding a wavelet mirror, with debug logging
//!
//! Run with:
//! ```bash
//! cargo run --example channel_demo
//! ```

use wavesync_core::core_channel::{QueuedTransport, SubmitResponse, WaveletDeltaChannel};
use wavesync_core::core_session::WaveletMirror;
use wavesync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use wavesync_core::test_utils::{client_delta, insert_op, server_delta_with, version};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig::new(LogLevel::Debug).with_target(true);
    init_logging_with_config(config)?;

    let mirror = WaveletMirror::new();
    let mut channel = WaveletDeltaChannel::new(QueuedTransport::new());
    channel.reset(Some(Box::new(mirror.clone())));
    channel.on_connection(version(0), version(0), None, None, None)?;

    // Our submission is outstanding while the server's edit overtakes its ack.
    let ticket = channel.send(|| client_delta(0, 1))?;
    let server_edit = server_delta_with(1, vec![insert_op("b+root", 0, 0, "hello")]);
    channel.on_wavelet_update(vec![server_edit], Some(version(1)))?;
    info!(deferred = channel.deferred_len(), "Server edit deferred");

    channel.on_submit_response(ticket, SubmitResponse::ack(1, version(1), 0))?;

    let content = mirror
        .state()
        .blip("b+root")
        .map(|b| b.content.clone())
        .unwrap_or_default();
    info!(
        version = ?mirror.version(),
        committed = ?mirror.last_committed(),
        content = %content,
        "Mirror caught up"
    );
    info!(stats = ?channel.stats(), "Channel stats");
    Ok(())
}
