#![no_main]

use libfuzzer_sys::fuzz_target;
use wavesync_core::config::ChannelConfig;
use wavesync_core::core_sim::{Scenario, ScenarioRunner, Step};

fuzz_target!(|data: &[u8]| {
    // Any parseable script must replay without panicking; channel errors
    // are part of the report.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(scenario) = Scenario::from_toml_str(text).or_else(|_| Scenario::from_json_str(text))
    else {
        return;
    };

    // Huge op counts only exercise the allocator.
    let small = scenario.steps.iter().all(|step| match step {
        Step::Connect { catch_up_ops, .. } => *catch_up_ops <= 64,
        Step::ServerDelta { ops, .. } | Step::Submit { ops, .. } => *ops <= 64,
        _ => true,
    });
    if small {
        let _ = ScenarioRunner::replay(&ChannelConfig::default(), &scenario);
    }
});
