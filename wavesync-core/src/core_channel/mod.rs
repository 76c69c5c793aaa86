/*
    core_channel - client side of the wavelet delta protocol

    Owns the single submission slot of a wavelet connection. Reconciles
    server deltas, commit notices and submission responses into one logical
    version order, and refuses to continue past a contiguity violation.

    Pieces:
      status     return codes and the recoverable/fatal nack table
      receiver   ordered notifications out of the channel
      transport  submissions into the network layer
      queue      deferred server input awaiting the outstanding response
      channel    the state machine
      driver     single-consumer input queue in front of the channel
*/

pub mod channel;
pub mod driver;
pub mod errors;
pub mod queue;
pub mod receiver;
pub mod status;
pub mod transport;

pub use channel::{ChannelStats, ConnectionState, WaveletDeltaChannel};
pub use driver::{ChannelDriver, ChannelFault, ChannelHandle, ChannelInput, DriverError};
pub use errors::{ChannelError, ChannelResult};
pub use queue::{DeferredQueue, QueuedEvent};
pub use receiver::{DeltaReceiver, EventLog, ReceiverEvent, RecordingReceiver};
pub use status::{NackClassifier, Recoverable, ReturnCode, ReturnStatus};
pub use transport::{
    PendingSubmission, QueuedTransport, SubmitResponse, SubmitTicket, WaveletTransport,
};
