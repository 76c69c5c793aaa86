//! Two-mode wavelet view

use super::errors::{SessionError, SessionResult};
use crate::core_ops::{ReversalContext, TransformedDelta, WaveletOperation, WaveletState};
use crate::core_version::VersionId;

/// A wavelet as seen by the session: either a frozen snapshot, or a state
/// kept current by the delta stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveletView {
    /// Detached snapshot; `version` is unknown for a locally built state
    Static {
        snapshot: WaveletState,
        version: Option<VersionId>,
    },
    /// Linked to a channel; `version` is the last version applied
    Live {
        state: WaveletState,
        version: VersionId,
    },
}

impl Default for WaveletView {
    fn default() -> Self {
        WaveletView::Static {
            snapshot: WaveletState::new(),
            version: None,
        }
    }
}

impl WaveletView {
    pub fn snapshot(snapshot: WaveletState, version: Option<VersionId>) -> Self {
        WaveletView::Static { snapshot, version }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, WaveletView::Live { .. })
    }

    pub fn state(&self) -> &WaveletState {
        match self {
            WaveletView::Static { snapshot, .. } => snapshot,
            WaveletView::Live { state, .. } => state,
        }
    }

    pub fn version(&self) -> Option<&VersionId> {
        match self {
            WaveletView::Static { version, .. } => version.as_ref(),
            WaveletView::Live { version, .. } => Some(version),
        }
    }

    /// Static -> Live at `version`.
    ///
    /// A snapshot taken at a known version must match it.
    pub fn go_live(&mut self, version: VersionId) -> SessionResult<()> {
        match self {
            WaveletView::Live { version: live, .. } => {
                Err(SessionError::AlreadyLive(live.sequence))
            }
            WaveletView::Static {
                version: Some(known),
                ..
            } if known.sequence != version.sequence => Err(SessionError::VersionMismatch {
                view: known.sequence,
                input: version.sequence,
            }),
            WaveletView::Static { snapshot, .. } => {
                let state = std::mem::take(snapshot);
                *self = WaveletView::Live { state, version };
                Ok(())
            }
        }
    }

    /// Live -> Static, keeping the current state and version. No-op on a
    /// static view.
    pub fn freeze(&mut self) {
        if let WaveletView::Live { state, version } = self {
            let snapshot = std::mem::take(state);
            let version = Some(version.clone());
            *self = WaveletView::Static { snapshot, version };
        }
    }

    /// Apply operations that take a static snapshot from its version to
    /// `target`, e.g. the catch-up operations of a reconnect
    pub fn catch_up(
        &mut self,
        operations: &[WaveletOperation],
        target: &VersionId,
    ) -> SessionResult<()> {
        let WaveletView::Static { snapshot, version } = self else {
            return Err(SessionError::NotLive);
        };
        let mut scratch = snapshot.clone();
        for op in operations {
            op.apply(&mut scratch)?;
        }
        *snapshot = scratch;
        *version = Some(target.clone());
        Ok(())
    }

    /// Apply a server delta to a live view and return its undo operations
    pub fn apply_delta(
        &mut self,
        delta: &TransformedDelta,
        reversal: &ReversalContext,
    ) -> SessionResult<Vec<WaveletOperation>> {
        let WaveletView::Live { state, version } = self else {
            return Err(SessionError::NotLive);
        };
        let applied_at = delta.applied_at_version().sequence;
        if applied_at != version.sequence {
            return Err(SessionError::VersionMismatch {
                view: version.sequence,
                input: applied_at,
            });
        }

        let undo = delta.apply_and_reverse(state, reversal)?;
        *version = delta.resulting_version().clone();
        Ok(undo)
    }

    /// Move a live view's version forward without touching state, as when
    /// the client's own submission is acknowledged
    pub fn advance_to(&mut self, target: VersionId) -> SessionResult<()> {
        let WaveletView::Live { version, .. } = self else {
            return Err(SessionError::NotLive);
        };
        if target.sequence < version.sequence {
            return Err(SessionError::VersionMismatch {
                view: version.sequence,
                input: target.sequence,
            });
        }
        *version = target;
        Ok(())
    }
}
