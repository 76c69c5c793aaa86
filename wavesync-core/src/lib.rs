pub mod config;
pub mod core_channel;
pub mod core_ops;
pub mod core_session;
pub mod core_sim;
pub mod core_version;
pub mod logging;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ChannelConfig, Config, ConfigError, DriverConfig};
pub use core_channel::{
    ChannelDriver, ChannelError, ChannelHandle, ChannelResult, ConnectionState, DeltaReceiver,
    ReturnCode, ReturnStatus, SubmitResponse, SubmitTicket, WaveletDeltaChannel,
    WaveletTransport,
};
pub use core_ops::{ClientDelta, TransformedDelta, WaveletOperation};
pub use core_session::WaveletMirror;
pub use core_sim::{ReplayReport, Scenario, ScenarioRunner};
pub use core_version::VersionId;
pub use logging::{init_logging, LogLevel};
