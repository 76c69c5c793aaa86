//! Test fixtures for versions, deltas and operations

use crate::core_ops::{
    ClientDelta, DocOp, OperationContext, ParticipantId, TransformedDelta, WaveletOperation,
};
use crate::core_version::{VersionHasher, VersionId};

/// Wavelet name that seeds fixture tags
pub const TEST_WAVELET: &str = "example.com/w+test/conv+root";

/// Timestamp stamped on fixture operations
pub const TEST_TIMESTAMP: u64 = 1_234_567_890;

pub fn author() -> ParticipantId {
    ParticipantId::new_unchecked("test@example.com")
}

pub fn other_author() -> ParticipantId {
    ParticipantId::new_unchecked("other@example.com")
}

/// Signed version at `sequence`; the same sequence always gets the same tag
pub fn version(sequence: u64) -> VersionId {
    VersionHasher::for_sequence(TEST_WAVELET, sequence)
}

pub fn context() -> OperationContext {
    OperationContext::new(author(), TEST_TIMESTAMP)
}

/// `count` no-op operations
pub fn no_ops(count: usize) -> Vec<WaveletOperation> {
    (0..count).map(|_| WaveletOperation::no_op(context())).collect()
}

/// Client delta of `ops` no-ops targeting `target`
pub fn client_delta(target: u64, ops: usize) -> ClientDelta {
    ClientDelta::new(version(target), author(), TEST_TIMESTAMP, no_ops(ops))
}

/// Server delta of `ops` no-ops applied at `applied_at`
pub fn server_delta(applied_at: u64, ops: usize) -> TransformedDelta {
    server_delta_with(applied_at, no_ops(ops))
}

/// Server delta carrying `operations`, applied at `applied_at`
pub fn server_delta_with(applied_at: u64, operations: Vec<WaveletOperation>) -> TransformedDelta {
    let resulting = applied_at + operations.len() as u64;
    TransformedDelta::new(
        version(applied_at),
        version(resulting),
        other_author(),
        TEST_TIMESTAMP,
        operations,
    )
    .expect("fixture delta is well-formed")
}

/// Insert `text` at `position` into a blip currently `doc_len` characters long
pub fn insert_op(blip_id: &str, doc_len: usize, position: usize, text: &str) -> WaveletOperation {
    WaveletOperation::blip_content(context(), blip_id, DocOp::insert(doc_len, position, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_versions_are_stable() {
        assert_eq!(version(57), version(57));
        assert_ne!(version(57), version(58));
        assert!(version(57).is_signed());
    }

    #[test]
    fn test_server_delta_chains() {
        let first = server_delta(57, 7);
        let second = server_delta(64, 3);
        assert_eq!(first.resulting_version(), second.applied_at_version());
    }
}
