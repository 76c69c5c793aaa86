//! Wavelet operations
//!
//! The closed set of mutation kinds. Application and reversal are plain
//! pattern matches so that adding a kind forces every site to handle it.

use super::context::{OperationContext, ReversalContext};
use super::doc_op::DocOp;
use super::errors::{OperationError, OperationResult};
use super::participant::ParticipantId;
use super::state::WaveletState;
use serde::{Deserialize, Serialize};

/// How a content operation updates the blip's contributor set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorMethod {
    /// Add the creator as a contributor
    Add,
    /// Remove the creator from the contributors
    Remove,
    /// Leave contributors untouched
    None,
}

impl ContributorMethod {
    pub fn reverse(self) -> Self {
        match self {
            ContributorMethod::Add => ContributorMethod::Remove,
            ContributorMethod::Remove => ContributorMethod::Add,
            ContributorMethod::None => ContributorMethod::None,
        }
    }
}

/// One atomic wavelet mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveletOperation {
    /// Add a participant, at `position` in the list or at the end
    AddParticipant {
        context: OperationContext,
        participant: ParticipantId,
        position: Option<usize>,
    },

    /// Remove a participant
    RemoveParticipant {
        context: OperationContext,
        participant: ParticipantId,
    },

    /// Mutate a blip's content
    BlipContent {
        context: OperationContext,
        blip_id: String,
        op: DocOp,
        contributor: ContributorMethod,
    },

    /// Replace a metadata value, `old` being the value it must currently have
    SetMetadata {
        context: OperationContext,
        key: String,
        old: Option<String>,
        new: Option<String>,
    },

    /// Advance the version without changing state
    NoOp { context: OperationContext },
}

impl WaveletOperation {
    pub fn add_participant(context: OperationContext, participant: ParticipantId) -> Self {
        WaveletOperation::AddParticipant {
            context,
            participant,
            position: None,
        }
    }

    pub fn remove_participant(context: OperationContext, participant: ParticipantId) -> Self {
        WaveletOperation::RemoveParticipant {
            context,
            participant,
        }
    }

    pub fn blip_content(context: OperationContext, blip_id: impl Into<String>, op: DocOp) -> Self {
        WaveletOperation::BlipContent {
            context,
            blip_id: blip_id.into(),
            op,
            contributor: ContributorMethod::Add,
        }
    }

    pub fn no_op(context: OperationContext) -> Self {
        WaveletOperation::NoOp { context }
    }

    pub fn context(&self) -> &OperationContext {
        match self {
            WaveletOperation::AddParticipant { context, .. }
            | WaveletOperation::RemoveParticipant { context, .. }
            | WaveletOperation::BlipContent { context, .. }
            | WaveletOperation::SetMetadata { context, .. }
            | WaveletOperation::NoOp { context } => context,
        }
    }

    /// Apply to `state`. On error the state is left unchanged.
    pub fn apply(&self, state: &mut WaveletState) -> OperationResult<()> {
        match self {
            WaveletOperation::AddParticipant {
                participant,
                position,
                ..
            } => {
                if state.is_participant(participant) {
                    return Err(OperationError::ParticipantExists(participant.to_string()));
                }
                let participants = state.participants_mut();
                match position {
                    Some(p) if *p > participants.len() => {
                        return Err(OperationError::InvalidPosition {
                            position: *p,
                            len: participants.len(),
                        });
                    }
                    Some(p) => participants.insert(*p, participant.clone()),
                    None => participants.push(participant.clone()),
                }
                Ok(())
            }

            WaveletOperation::RemoveParticipant { participant, .. } => {
                let participants = state.participants_mut();
                let index = participants
                    .iter()
                    .position(|p| p == participant)
                    .ok_or_else(|| OperationError::ParticipantMissing(participant.to_string()))?;
                participants.remove(index);
                Ok(())
            }

            WaveletOperation::BlipContent {
                context,
                blip_id,
                op,
                contributor,
            } => {
                let mut blip = state.blip_or_default(blip_id);
                blip.content = op.apply(&blip.content).map_err(|e| {
                    OperationError::DocumentMismatch {
                        blip: blip_id.clone(),
                        reason: e.0,
                    }
                })?;
                match contributor {
                    ContributorMethod::Add => {
                        blip.contributors.insert(context.creator.clone());
                    }
                    ContributorMethod::Remove => {
                        blip.contributors.remove(&context.creator);
                    }
                    ContributorMethod::None => {}
                }
                state.put_blip(blip_id, blip);
                Ok(())
            }

            WaveletOperation::SetMetadata { key, old, new, .. } => {
                let metadata = state.metadata_mut();
                let current = metadata.get(key).cloned();
                if current != *old {
                    return Err(OperationError::MetadataMismatch {
                        key: key.clone(),
                        expected: old.clone(),
                        actual: current,
                    });
                }
                match new {
                    Some(value) => metadata.insert(key.clone(), value.clone()),
                    None => metadata.remove(key),
                };
                Ok(())
            }

            WaveletOperation::NoOp { .. } => Ok(()),
        }
    }

    /// Inverse computed from the operation alone.
    ///
    /// Exact for metadata, no-op and participant additions. Content
    /// operations assume the contributor method took full effect and a
    /// removed participant is re-added at the end of the list; use
    /// [`apply_and_reverse`](Self::apply_and_reverse) when the inverse must
    /// restore the prior state exactly.
    pub fn reverse(&self, reversal: &ReversalContext) -> Vec<WaveletOperation> {
        let context = self.context().reversed(reversal);
        let inverse = match self {
            WaveletOperation::AddParticipant { participant, .. } => {
                WaveletOperation::RemoveParticipant {
                    context,
                    participant: participant.clone(),
                }
            }
            WaveletOperation::RemoveParticipant { participant, .. } => {
                WaveletOperation::AddParticipant {
                    context,
                    participant: participant.clone(),
                    position: None,
                }
            }
            WaveletOperation::BlipContent {
                blip_id,
                op,
                contributor,
                ..
            } => WaveletOperation::BlipContent {
                context,
                blip_id: blip_id.clone(),
                op: op.invert(),
                contributor: contributor.reverse(),
            },
            WaveletOperation::SetMetadata { key, old, new, .. } => WaveletOperation::SetMetadata {
                context,
                key: key.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            WaveletOperation::NoOp { .. } => WaveletOperation::NoOp { context },
        };
        vec![inverse]
    }

    /// Apply to `state` and return the operations that restore it exactly
    pub fn apply_and_reverse(
        &self,
        state: &mut WaveletState,
        reversal: &ReversalContext,
    ) -> OperationResult<Vec<WaveletOperation>> {
        let inverse = match self {
            WaveletOperation::RemoveParticipant {
                context,
                participant,
            } => {
                let position = state.participants().iter().position(|p| p == participant);
                self.apply(state)?;
                WaveletOperation::AddParticipant {
                    context: context.reversed(reversal),
                    participant: participant.clone(),
                    position,
                }
            }

            WaveletOperation::BlipContent {
                context,
                blip_id,
                op,
                contributor,
            } => {
                let was_contributor = state
                    .blip(blip_id)
                    .map(|b| b.contributors.contains(&context.creator))
                    .unwrap_or(false);
                // Only a method that actually changes the set is undone.
                let effective = match (contributor, was_contributor) {
                    (ContributorMethod::Add, true) | (ContributorMethod::Remove, false) => {
                        ContributorMethod::None
                    }
                    (method, _) => *method,
                };
                self.apply(state)?;
                WaveletOperation::BlipContent {
                    context: context.reversed(reversal),
                    blip_id: blip_id.clone(),
                    op: op.invert(),
                    contributor: effective.reverse(),
                }
            }

            _ => {
                self.apply(state)?;
                return Ok(self.reverse(reversal));
            }
        };
        Ok(vec![inverse])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::new("alice@example.com").unwrap()
    }

    fn bob() -> ParticipantId {
        ParticipantId::new("bob@example.com").unwrap()
    }

    fn ctx(creator: ParticipantId) -> OperationContext {
        OperationContext::new(creator, 1_000)
    }

    #[test]
    fn test_add_and_remove_participant() {
        let mut state = WaveletState::new();
        WaveletOperation::add_participant(ctx(alice()), alice())
            .apply(&mut state)
            .unwrap();
        WaveletOperation::add_participant(ctx(alice()), bob())
            .apply(&mut state)
            .unwrap();
        assert_eq!(state.participants(), &[alice(), bob()]);

        let duplicate = WaveletOperation::add_participant(ctx(alice()), bob()).apply(&mut state);
        assert!(matches!(duplicate, Err(OperationError::ParticipantExists(_))));

        WaveletOperation::remove_participant(ctx(alice()), alice())
            .apply(&mut state)
            .unwrap();
        assert_eq!(state.participants(), &[bob()]);
    }

    #[test]
    fn test_remove_reverse_restores_position() {
        let mut state = WaveletState::new();
        for p in [alice(), bob()] {
            WaveletOperation::add_participant(ctx(alice()), p)
                .apply(&mut state)
                .unwrap();
        }
        let before = state.clone();

        let inverse = WaveletOperation::remove_participant(ctx(bob()), alice())
            .apply_and_reverse(&mut state, &ReversalContext::new(2_000))
            .unwrap();
        for op in &inverse {
            op.apply(&mut state).unwrap();
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_blip_content_adds_contributor() {
        let mut state = WaveletState::new();
        let op = WaveletOperation::blip_content(ctx(alice()), "b+1", DocOp::insert(0, 0, "hi"));
        op.apply(&mut state).unwrap();

        let blip = state.blip("b+1").unwrap();
        assert_eq!(blip.content, "hi");
        assert!(blip.contributors.contains(&alice()));
    }

    #[test]
    fn test_blip_reverse_keeps_existing_contributor() {
        let mut state = WaveletState::new();
        WaveletOperation::blip_content(ctx(alice()), "b+1", DocOp::insert(0, 0, "hi"))
            .apply(&mut state)
            .unwrap();
        let before = state.clone();

        let edit = WaveletOperation::blip_content(ctx(alice()), "b+1", DocOp::insert(2, 2, "!"));
        let inverse = edit
            .apply_and_reverse(&mut state, &ReversalContext::new(5))
            .unwrap();
        for op in &inverse {
            op.apply(&mut state).unwrap();
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_reverse_of_new_blip_removes_it() {
        let mut state = WaveletState::new();
        let inverse = WaveletOperation::blip_content(ctx(bob()), "b+2", DocOp::insert(0, 0, "x"))
            .apply_and_reverse(&mut state, &ReversalContext::new(5))
            .unwrap();
        assert!(state.blip("b+2").is_some());

        for op in &inverse {
            op.apply(&mut state).unwrap();
        }
        assert!(state.blip("b+2").is_none());
        assert_eq!(state, WaveletState::new());
    }

    #[test]
    fn test_metadata_precondition() {
        let mut state = WaveletState::new();
        let set = WaveletOperation::SetMetadata {
            context: ctx(alice()),
            key: "title".to_string(),
            old: None,
            new: Some("Plans".to_string()),
        };
        set.apply(&mut state).unwrap();
        assert_eq!(state.metadata("title"), Some("Plans"));

        // Same precondition no longer holds
        assert!(matches!(
            set.apply(&mut state),
            Err(OperationError::MetadataMismatch { .. })
        ));

        for op in set.reverse(&ReversalContext::new(1)) {
            op.apply(&mut state).unwrap();
        }
        assert_eq!(state.metadata("title"), None);
    }

    #[test]
    fn test_failed_content_op_leaves_state() {
        let mut state = WaveletState::new();
        let bad = WaveletOperation::blip_content(
            ctx(alice()),
            "b+1",
            DocOp::builder().retain(4).build(),
        );
        assert!(matches!(
            bad.apply(&mut state),
            Err(OperationError::DocumentMismatch { .. })
        ));
        assert_eq!(state, WaveletState::new());
    }

    #[test]
    fn test_reverse_context_keeps_author() {
        let op = WaveletOperation::no_op(ctx(alice()));
        let inverse = op.reverse(&ReversalContext::new(99));
        assert_eq!(inverse[0].context().creator, alice());
        assert_eq!(inverse[0].context().timestamp, 99);
    }
}
