#![no_main]

use libfuzzer_sys::fuzz_target;
use wavesync_core::core_ops::TransformedDelta;

fuzz_target!(|data: &[u8]| {
    // Decoding must reject deltas whose versions disagree with their op
    // count instead of handing them to the channel.
    if let Ok(delta) = bincode::deserialize::<TransformedDelta>(data) {
        let span = delta.resulting_version().sequence - delta.applied_at_version().sequence;
        assert_eq!(span, delta.len() as u64);
    }
});
