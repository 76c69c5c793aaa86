//! Integrity tag derivation for wavelet versions
//!
//! The server chains tags along history: the tag of a version is the hash of
//! the previous tag followed by the serialized delta that produced it. This
//! module is used by server simulations and test tooling only.

use super::VersionId;

/// Length in bytes of a derived integrity tag
pub const TAG_LEN: usize = 20;

/// Derives chained integrity tags
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionHasher;

impl VersionHasher {
    /// Version zero of the named wavelet
    pub fn initial(wavelet_name: &str) -> VersionId {
        let hash = blake3::hash(wavelet_name.as_bytes());
        VersionId::new(0, truncate(hash.as_bytes()))
    }

    /// Version reached by applying `op_count` operations, serialized as
    /// `delta_bytes`, on top of `previous`
    pub fn next(previous: &VersionId, delta_bytes: &[u8], op_count: u64) -> VersionId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&previous.tag);
        hasher.update(delta_bytes);
        let hash = hasher.finalize();
        VersionId::new(previous.sequence + op_count, truncate(hash.as_bytes()))
    }

    /// Deterministic tag for a bare sequence number.
    ///
    /// Scripted scenarios and fixtures only know sequence numbers; this gives
    /// every sequence a stable tag so repeated references compare equal.
    pub fn for_sequence(seed: &str, sequence: u64) -> VersionId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(seed.as_bytes());
        hasher.update(&sequence.to_le_bytes());
        let hash = hasher.finalize();
        VersionId::new(sequence, truncate(hash.as_bytes()))
    }
}

fn truncate(bytes: &[u8; 32]) -> Vec<u8> {
    bytes[..TAG_LEN].to_vec()
}
