//! Message-passing front end for the channel
//!
//! Transport callbacks become [`ChannelInput`] messages on a single queue.
//! [`ChannelDriver::run`] applies them one at a time, so the channel never
//! sees two calls at once and needs no locking.

use super::channel::WaveletDeltaChannel;
use super::errors::{ChannelError, ChannelResult};
use super::receiver::DeltaReceiver;
use super::transport::{SubmitResponse, SubmitTicket, WaveletTransport};
use crate::config::DriverConfig;
use crate::core_ops::{ClientDelta, TransformedDelta, WaveletOperation};
use crate::core_version::VersionId;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// One call into the channel, queued
pub enum ChannelInput {
    Connection {
        connect_version: VersionId,
        last_modified_version: VersionId,
        committed_version: Option<VersionId>,
        unacknowledged_delta_version: Option<VersionId>,
        catch_up_ops: Option<Vec<WaveletOperation>>,
    },
    Update {
        deltas: Vec<TransformedDelta>,
        committed_version: Option<VersionId>,
    },
    SubmitResponse {
        ticket: SubmitTicket,
        response: SubmitResponse,
    },
    Send {
        delta: ClientDelta,
        reply: Option<oneshot::Sender<ChannelResult<SubmitTicket>>>,
    },
    Reset {
        receiver: Option<Box<dyn DeltaReceiver>>,
    },
    /// Stop the loop even though handles are still alive
    Shutdown,
}

impl ChannelInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelInput::Connection { .. } => "connection",
            ChannelInput::Update { .. } => "update",
            ChannelInput::SubmitResponse { .. } => "submit_response",
            ChannelInput::Send { .. } => "send",
            ChannelInput::Reset { .. } => "reset",
            ChannelInput::Shutdown => "shutdown",
        }
    }
}

/// An error raised while applying a queued input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFault {
    pub input: &'static str,
    pub error: ChannelError,
}

/// Errors from a [`ChannelHandle`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Channel driver has stopped")]
    Closed,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Cloneable sender side of the driver queue
#[derive(Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<ChannelInput>,
}

impl ChannelHandle {
    fn enqueue(&self, input: ChannelInput) -> Result<(), DriverError> {
        self.tx.send(input).map_err(|_| DriverError::Closed)
    }

    pub fn connect(
        &self,
        connect_version: VersionId,
        last_modified_version: VersionId,
        committed_version: Option<VersionId>,
        unacknowledged_delta_version: Option<VersionId>,
        catch_up_ops: Option<Vec<WaveletOperation>>,
    ) -> Result<(), DriverError> {
        self.enqueue(ChannelInput::Connection {
            connect_version,
            last_modified_version,
            committed_version,
            unacknowledged_delta_version,
            catch_up_ops,
        })
    }

    pub fn update(
        &self,
        deltas: Vec<TransformedDelta>,
        committed_version: Option<VersionId>,
    ) -> Result<(), DriverError> {
        self.enqueue(ChannelInput::Update {
            deltas,
            committed_version,
        })
    }

    pub fn respond(
        &self,
        ticket: SubmitTicket,
        response: SubmitResponse,
    ) -> Result<(), DriverError> {
        self.enqueue(ChannelInput::SubmitResponse { ticket, response })
    }

    /// Submit a delta and wait for the channel to accept it
    ///
    /// # Returns
    /// The ticket the eventual response must carry
    pub async fn send(&self, delta: ClientDelta) -> Result<SubmitTicket, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(ChannelInput::Send {
            delta,
            reply: Some(reply),
        })?;
        let ticket = rx.await.map_err(|_| DriverError::Closed)??;
        Ok(ticket)
    }

    pub fn reset(&self, receiver: Option<Box<dyn DeltaReceiver>>) -> Result<(), DriverError> {
        self.enqueue(ChannelInput::Reset { receiver })
    }

    pub fn shutdown(&self) -> Result<(), DriverError> {
        self.enqueue(ChannelInput::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owns a channel and feeds it queued inputs
pub struct ChannelDriver<T: WaveletTransport> {
    channel: WaveletDeltaChannel<T>,
    rx: mpsc::UnboundedReceiver<ChannelInput>,
    faults: mpsc::Sender<ChannelFault>,
}

impl<T: WaveletTransport> ChannelDriver<T> {
    /// Create a driver around `channel`
    ///
    /// # Returns
    /// The driver, a handle to feed it, and the receiving end of the fault
    /// queue (bounded by `config.fault_capacity`)
    pub fn new(
        channel: WaveletDeltaChannel<T>,
        config: &DriverConfig,
    ) -> (Self, ChannelHandle, mpsc::Receiver<ChannelFault>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (faults, fault_rx) = mpsc::channel(config.fault_capacity.max(1));
        (
            Self {
                channel,
                rx,
                faults,
            },
            ChannelHandle { tx },
            fault_rx,
        )
    }

    pub fn channel(&self) -> &WaveletDeltaChannel<T> {
        &self.channel
    }

    /// Apply one input synchronously
    pub fn apply(&mut self, input: ChannelInput) -> ChannelResult<()> {
        match input {
            ChannelInput::Connection {
                connect_version,
                last_modified_version,
                committed_version,
                unacknowledged_delta_version,
                catch_up_ops,
            } => self.channel.on_connection(
                connect_version,
                last_modified_version,
                committed_version,
                unacknowledged_delta_version,
                catch_up_ops,
            ),
            ChannelInput::Update {
                deltas,
                committed_version,
            } => self.channel.on_wavelet_update(deltas, committed_version),
            ChannelInput::SubmitResponse { ticket, response } => {
                self.channel.on_submit_response(ticket, response)
            }
            ChannelInput::Send { delta, reply } => {
                let result = self.channel.send(move || delta);
                if let Some(reply) = reply {
                    // A caller that stopped waiting does not undo the submission.
                    let _ = reply.send(result.clone());
                }
                result.map(|_| ())
            }
            ChannelInput::Reset { receiver } => {
                self.channel.reset(receiver);
                Ok(())
            }
            ChannelInput::Shutdown => Ok(()),
        }
    }

    /// Drain the queue until every handle is dropped or a shutdown arrives.
    ///
    /// Errors never stop the loop; they are forwarded on the fault queue.
    pub async fn run(mut self) -> WaveletDeltaChannel<T> {
        info!(epoch = self.channel.epoch(), "Channel driver started");

        while let Some(input) = self.rx.recv().await {
            if matches!(input, ChannelInput::Shutdown) {
                debug!("Channel driver shutdown requested");
                break;
            }

            let kind = input.kind();
            if let Err(error) = self.apply(input) {
                self.report(kind, error);
            }
        }

        info!(epoch = self.channel.epoch(), "Channel driver stopped");
        self.channel
    }

    fn report(&self, input: &'static str, error: ChannelError) {
        warn!(input, error = %error, "Channel input failed");
        match self.faults.try_send(ChannelFault { input, error }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(fault)) => {
                warn!(input = fault.input, "Fault queue full; dropping fault");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
