//! In-memory wavelet state that operations apply to

use super::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Content and attribution of one blip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlipData {
    pub content: String,
    pub contributors: BTreeSet<ParticipantId>,
}

impl BlipData {
    fn is_vacant(&self) -> bool {
        self.content.is_empty() && self.contributors.is_empty()
    }
}

/// A wavelet's participants, blips and metadata.
///
/// A blip with no content and no contributors is indistinguishable from an
/// absent one and is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveletState {
    participants: Vec<ParticipantId>,
    blips: BTreeMap<String, BlipData>,
    metadata: BTreeMap<String, String>,
}

impl WaveletState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    pub fn is_participant(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    pub fn blip(&self, blip_id: &str) -> Option<&BlipData> {
        self.blips.get(blip_id)
    }

    pub fn blip_ids(&self) -> impl Iterator<Item = &str> {
        self.blips.keys().map(String::as_str)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub(crate) fn participants_mut(&mut self) -> &mut Vec<ParticipantId> {
        &mut self.participants
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.metadata
    }

    /// Blip contents, or an empty blip if absent
    pub(crate) fn blip_or_default(&self, blip_id: &str) -> BlipData {
        self.blips.get(blip_id).cloned().unwrap_or_default()
    }

    /// Store a blip, dropping it if it became vacant
    pub(crate) fn put_blip(&mut self, blip_id: &str, blip: BlipData) {
        if blip.is_vacant() {
            self.blips.remove(blip_id);
        } else {
            self.blips.insert(blip_id.to_string(), blip);
        }
    }
}
