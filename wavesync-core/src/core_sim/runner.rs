//! Scenario replay against a real channel

use super::errors::{SimError, SimResult};
use super::scenario::{Scenario, Step};
use crate::config::ChannelConfig;
use crate::core_channel::{
    ChannelError, ChannelStats, DeltaReceiver, EventLog, QueuedTransport, ReceiverEvent,
    Recoverable, RecordingReceiver, SubmitResponse, WaveletDeltaChannel,
};
use crate::core_ops::{
    ClientDelta, OperationContext, OperationResult, ParticipantId, TransformedDelta,
    WaveletOperation,
};
use crate::core_version::{VersionHasher, VersionId};
use crate::metrics::{Timer, SCENARIO_REPLAY_DURATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const CLIENT: &str = "client@wavesync.local";
const SERVER: &str = "server@wavesync.local";

/// Channel error raised by a step, in reportable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub message: String,
    pub recoverable: Recoverable,
    pub fatal: bool,
}

impl From<&ChannelError> for StepError {
    fn from(error: &ChannelError) -> Self {
        Self {
            message: error.to_string(),
            recoverable: error.recoverable(),
            fatal: error.is_fatal(),
        }
    }
}

/// What one step produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: Step,
    pub events: Vec<ReceiverEvent>,
    pub error: Option<StepError>,
}

/// Result of a full replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub name: String,
    pub steps: Vec<StepOutcome>,
    pub stats: ChannelStats,
    /// Whether the recorded event kinds matched `expect`, when given
    pub expectation_met: Option<bool>,
}

impl ReplayReport {
    /// Kinds of all receiver events, in delivery order
    pub fn event_kinds(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .flat_map(|s| s.events.iter().map(ReceiverEvent::kind))
            .collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &StepError> {
        self.steps.iter().filter_map(|s| s.error.as_ref())
    }
}

/// Drives a channel over an in-memory transport, one scripted step at a time
pub struct ScenarioRunner {
    channel: WaveletDeltaChannel<QueuedTransport>,
    log: EventLog,
    seed: String,
    clock: u64,
}

impl ScenarioRunner {
    pub fn new(config: &ChannelConfig, seed: impl Into<String>) -> Self {
        let log = EventLog::new();
        let mut channel = WaveletDeltaChannel::with_config(QueuedTransport::new(), config);
        channel.reset(Some(Box::new(RecordingReceiver::new(log.clone()))));
        Self {
            channel,
            log,
            seed: seed.into(),
            clock: 0,
        }
    }

    pub fn channel(&self) -> &WaveletDeltaChannel<QueuedTransport> {
        &self.channel
    }

    /// Replay every step of `scenario` on a fresh runner
    pub fn replay(config: &ChannelConfig, scenario: &Scenario) -> SimResult<ReplayReport> {
        let mut runner = Self::new(config, scenario.seed());
        runner.run(scenario)
    }

    /// Replay every step; channel errors are recorded, not returned
    pub fn run(&mut self, scenario: &Scenario) -> SimResult<ReplayReport> {
        let timer = Timer::new(SCENARIO_REPLAY_DURATION);
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            steps.push(self.step(index, step)?);
        }
        let elapsed_ms = timer.stop();

        let mut report = ReplayReport {
            name: scenario.name.clone(),
            steps,
            stats: self.channel.stats().clone(),
            expectation_met: None,
        };
        if let Some(expected) = &scenario.expect {
            report.expectation_met = Some(report.event_kinds() == *expected);
        }

        info!(
            scenario = %scenario.name,
            steps = report.steps.len(),
            elapsed_ms,
            "Scenario replayed"
        );
        Ok(report)
    }

    /// Apply one step and collect what the receiver saw
    pub fn step(&mut self, index: usize, step: &Step) -> SimResult<StepOutcome> {
        debug!(index, kind = step.kind(), "Replaying step");
        self.clock += 1;

        let result = match step {
            Step::Connect {
                version,
                connect_version,
                committed,
                unacknowledged,
                catch_up_ops,
            } => {
                let ops = (*catch_up_ops > 0).then(|| self.no_ops(SERVER, *catch_up_ops));
                let connect = self.version(connect_version.unwrap_or(*version));
                let last_modified = self.version(*version);
                let committed = committed.map(|v| self.version(v));
                let unacknowledged = unacknowledged.map(|v| self.version(v));
                self.channel
                    .on_connection(connect, last_modified, committed, unacknowledged, ops)
            }
            Step::ServerDelta {
                applied_at,
                ops,
                committed,
            } => {
                let delta = self
                    .server_delta(*applied_at, *ops)
                    .map_err(|source| SimError::Operation { step: index, source })?;
                let committed = committed.map(|v| self.version(v));
                self.channel.on_wavelet_update(vec![delta], committed)
            }
            Step::Commit { version } => {
                let committed = self.version(*version);
                self.channel.on_wavelet_update(Vec::new(), Some(committed))
            }
            Step::Submit { ops, target } => {
                let target = target
                    .or_else(|| self.channel.expected_version().map(|v| v.sequence))
                    .unwrap_or(0);
                let delta = ClientDelta::new(
                    self.version(target),
                    ParticipantId::new_unchecked(CLIENT),
                    self.clock,
                    self.no_ops(CLIENT, *ops),
                );
                self.channel.send(move || delta).map(|_| ())
            }
            Step::Ack {
                ops_applied,
                version,
            } => {
                let pending = self
                    .channel
                    .transport_mut()
                    .next_pending()
                    .ok_or(SimError::NoPendingSubmission { step: index })?;
                let response =
                    SubmitResponse::ack(*ops_applied, self.version(*version), self.clock);
                self.channel.on_submit_response(pending.ticket, response)
            }
            Step::Nack {
                version,
                code,
                message,
            } => {
                let pending = self
                    .channel
                    .transport_mut()
                    .next_pending()
                    .ok_or(SimError::NoPendingSubmission { step: index })?;
                let response = SubmitResponse::nack(self.version(*version), *code, message.clone());
                self.channel.on_submit_response(pending.ticket, response)
            }
            Step::Reset { detach } => {
                let receiver: Option<Box<dyn DeltaReceiver>> = if *detach {
                    None
                } else {
                    Some(Box::new(RecordingReceiver::new(self.log.clone())))
                };
                self.channel.reset(receiver);
                Ok(())
            }
        };

        Ok(StepOutcome {
            index,
            step: step.clone(),
            events: self.log.drain(),
            error: result.as_ref().err().map(StepError::from),
        })
    }

    fn version(&self, sequence: u64) -> VersionId {
        VersionHasher::for_sequence(&self.seed, sequence)
    }

    fn no_ops(&self, author: &str, count: usize) -> Vec<WaveletOperation> {
        let context = OperationContext::new(ParticipantId::new_unchecked(author), self.clock);
        (0..count)
            .map(|_| WaveletOperation::no_op(context.clone()))
            .collect()
    }

    fn server_delta(&self, applied_at: u64, ops: usize) -> OperationResult<TransformedDelta> {
        TransformedDelta::new(
            self.version(applied_at),
            self.version(applied_at.saturating_add(ops as u64)),
            ParticipantId::new_unchecked(SERVER),
            self.clock,
            self.no_ops(SERVER, ops),
        )
    }
}
