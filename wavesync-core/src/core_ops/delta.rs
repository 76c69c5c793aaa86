//! Client and server deltas

use super::context::ReversalContext;
use super::errors::{OperationError, OperationResult};
use super::operation::WaveletOperation;
use super::participant::ParticipantId;
use super::state::WaveletState;
use crate::core_version::VersionId;
use serde::{Deserialize, Serialize};

/// One atomic client submission, built against `target_version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDelta {
    pub target_version: VersionId,
    pub author: ParticipantId,
    /// Client clock when the delta was built, in milliseconds
    pub timestamp_hint: u64,
    pub operations: Vec<WaveletOperation>,
}

impl ClientDelta {
    pub fn new(
        target_version: VersionId,
        author: ParticipantId,
        timestamp_hint: u64,
        operations: Vec<WaveletOperation>,
    ) -> Self {
        Self {
            target_version,
            author,
            timestamp_hint,
            operations,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Inverse operations, last operation first
    pub fn reverse(&self, reversal: &ReversalContext) -> Vec<WaveletOperation> {
        reverse_all(&self.operations, reversal)
    }
}

/// A delta as applied by the server: already transformed, with the version
/// it was applied at and the version it produced.
///
/// Every operation advances the version by one, so
/// `resulting.sequence == applied_at.sequence + operations.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransformedDeltaParts")]
pub struct TransformedDelta {
    applied_at_version: VersionId,
    resulting_version: VersionId,
    author: ParticipantId,
    timestamp: u64,
    operations: Vec<WaveletOperation>,
}

#[derive(Deserialize)]
struct TransformedDeltaParts {
    applied_at_version: VersionId,
    resulting_version: VersionId,
    author: ParticipantId,
    timestamp: u64,
    operations: Vec<WaveletOperation>,
}

impl TryFrom<TransformedDeltaParts> for TransformedDelta {
    type Error = OperationError;

    fn try_from(parts: TransformedDeltaParts) -> Result<Self, Self::Error> {
        TransformedDelta::new(
            parts.applied_at_version,
            parts.resulting_version,
            parts.author,
            parts.timestamp,
            parts.operations,
        )
    }
}

impl TransformedDelta {
    pub fn new(
        applied_at_version: VersionId,
        resulting_version: VersionId,
        author: ParticipantId,
        timestamp: u64,
        operations: Vec<WaveletOperation>,
    ) -> OperationResult<Self> {
        let expected = applied_at_version
            .sequence
            .checked_add(operations.len() as u64);
        if expected != Some(resulting_version.sequence) {
            return Err(OperationError::InvalidDelta(format!(
                "{} operations applied at {} cannot result in {}",
                operations.len(),
                applied_at_version,
                resulting_version
            )));
        }

        Ok(Self {
            applied_at_version,
            resulting_version,
            author,
            timestamp,
            operations,
        })
    }

    pub fn applied_at_version(&self) -> &VersionId {
        &self.applied_at_version
    }

    pub fn resulting_version(&self) -> &VersionId {
        &self.resulting_version
    }

    pub fn author(&self) -> &ParticipantId {
        &self.author
    }

    /// Server application time, in milliseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn operations(&self) -> &[WaveletOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Serialized form, as hashed into the next version's integrity tag
    pub fn encode(&self) -> OperationResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Apply every operation in order. Either all apply or the state is
    /// left unchanged.
    pub fn apply(&self, state: &mut WaveletState) -> OperationResult<()> {
        let mut scratch = state.clone();
        for op in &self.operations {
            op.apply(&mut scratch)?;
        }
        *state = scratch;
        Ok(())
    }

    /// Inverse operations, last operation first
    pub fn reverse(&self, reversal: &ReversalContext) -> Vec<WaveletOperation> {
        reverse_all(&self.operations, reversal)
    }

    /// Apply every operation and return the operations that undo the whole
    /// delta, last operation's inverse first
    pub fn apply_and_reverse(
        &self,
        state: &mut WaveletState,
        reversal: &ReversalContext,
    ) -> OperationResult<Vec<WaveletOperation>> {
        let mut scratch = state.clone();
        let mut inverses = Vec::with_capacity(self.operations.len());
        for op in &self.operations {
            inverses.push(op.apply_and_reverse(&mut scratch, reversal)?);
        }
        *state = scratch;
        Ok(inverses.into_iter().rev().flatten().collect())
    }
}

fn reverse_all(
    operations: &[WaveletOperation],
    reversal: &ReversalContext,
) -> Vec<WaveletOperation> {
    operations
        .iter()
        .rev()
        .flat_map(|op| op.reverse(reversal))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_ops::{DocOp, OperationContext};

    fn alice() -> ParticipantId {
        ParticipantId::new("alice@example.com").unwrap()
    }

    fn ops(n: usize) -> Vec<WaveletOperation> {
        (0..n)
            .map(|i| WaveletOperation::no_op(OperationContext::new(alice(), i as u64)))
            .collect()
    }

    #[test]
    fn test_transformed_delta_checks_versions() {
        let ok = TransformedDelta::new(
            VersionId::unsigned(57),
            VersionId::unsigned(64),
            alice(),
            0,
            ops(7),
        );
        assert!(ok.is_ok());

        let bad = TransformedDelta::new(
            VersionId::unsigned(57),
            VersionId::unsigned(63),
            alice(),
            0,
            ops(7),
        );
        assert!(matches!(bad, Err(OperationError::InvalidDelta(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        let delta = TransformedDelta::new(
            VersionId::unsigned(1),
            VersionId::unsigned(3),
            alice(),
            0,
            ops(2),
        )
        .unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&delta).unwrap();
        json["resulting_version"]["sequence"] = serde_json::json!(9);

        assert!(serde_json::from_value::<TransformedDelta>(json).is_err());
    }

    #[test]
    fn test_apply_is_atomic() {
        let mut state = WaveletState::new();
        let ctx = OperationContext::new(alice(), 0);
        let delta = TransformedDelta::new(
            VersionId::unsigned(0),
            VersionId::unsigned(2),
            alice(),
            0,
            vec![
                WaveletOperation::add_participant(ctx.clone(), alice()),
                WaveletOperation::add_participant(ctx, alice()),
            ],
        )
        .unwrap();

        assert!(delta.apply(&mut state).is_err());
        assert!(state.participants().is_empty());
    }

    #[test]
    fn test_reverse_order() {
        let ctx = OperationContext::new(alice(), 0);
        let delta = ClientDelta::new(
            VersionId::unsigned(0),
            alice(),
            0,
            vec![
                WaveletOperation::blip_content(ctx.clone(), "b", DocOp::insert(0, 0, "a")),
                WaveletOperation::blip_content(ctx, "b", DocOp::insert(1, 1, "b")),
            ],
        );

        let reversed = delta.reverse(&ReversalContext::new(1));
        match &reversed[0] {
            WaveletOperation::BlipContent { op, .. } => {
                assert_eq!(op, &DocOp::insert(1, 1, "b").invert());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
