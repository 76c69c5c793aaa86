/*
    core_sim - scripted replay of channel scenarios

    A Scenario is a TOML or JSON list of transport inputs (connect, server
    deltas, commits, submissions and their responses, resets). The
    ScenarioRunner feeds them to a channel over an in-memory transport and
    reports what the receiver saw after each step.
*/

pub mod errors;
pub mod runner;
pub mod scenario;

pub use errors::{SimError, SimResult};
pub use runner::{ReplayReport, ScenarioRunner, StepError, StepOutcome};
pub use scenario::{Scenario, Step};
