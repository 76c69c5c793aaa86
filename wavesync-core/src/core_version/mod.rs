/*
    core_version - Points in a wavelet's history

    A wavelet's history is a sequence of versions. Every applied operation
    advances the sequence number by one; the server attaches an integrity tag
    to each version it reports. Clients treat tags as opaque and never
    recompute them.
*/

pub mod hasher;
pub mod version_id;

pub use hasher::{VersionHasher, TAG_LEN};
pub use version_id::VersionId;
