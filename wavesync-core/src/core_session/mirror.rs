//! A receiver that keeps a live copy of the wavelet

use super::errors::SessionError;
use super::view::WaveletView;
use crate::core_channel::{DeltaReceiver, ReturnStatus};
use crate::core_ops::{ReversalContext, TransformedDelta, WaveletOperation, WaveletState};
use crate::core_version::VersionId;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Undo record for one applied server delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    /// Version the delta produced
    pub version: VersionId,
    /// Operations restoring the state before the delta
    pub operations: Vec<WaveletOperation>,
}

#[derive(Debug, Default)]
struct MirrorInner {
    view: WaveletView,
    undo: Vec<UndoEntry>,
    last_acked: Option<VersionId>,
    last_committed: Option<u64>,
    nacks: Vec<(ReturnStatus, u64)>,
    errors: Vec<SessionError>,
}

/// Mirror of the server's wavelet, fed by the channel.
///
/// Server deltas are applied to the view as they are delivered. Acks only
/// move the version: the client's own operations belong to the document
/// layer. A delta that fails to apply freezes the view and is recorded.
/// Clones share the same mirror.
#[derive(Debug, Clone, Default)]
pub struct WaveletMirror {
    inner: Arc<Mutex<MirrorInner>>,
}

impl WaveletMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known snapshot
    pub fn from_snapshot(snapshot: WaveletState, version: VersionId) -> Self {
        let inner = MirrorInner {
            view: WaveletView::snapshot(snapshot, Some(version)),
            ..MirrorInner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MirrorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_live(&self) -> bool {
        self.lock().view.is_live()
    }

    pub fn version(&self) -> Option<VersionId> {
        self.lock().view.version().cloned()
    }

    /// Copy of the current wavelet state
    pub fn state(&self) -> WaveletState {
        self.lock().view.state().clone()
    }

    pub fn last_acked(&self) -> Option<VersionId> {
        self.lock().last_acked.clone()
    }

    pub fn last_committed(&self) -> Option<u64> {
        self.lock().last_committed
    }

    pub fn nacks(&self) -> Vec<(ReturnStatus, u64)> {
        self.lock().nacks.clone()
    }

    pub fn errors(&self) -> Vec<SessionError> {
        self.lock().errors.clone()
    }

    pub fn undo_depth(&self) -> usize {
        self.lock().undo.len()
    }

    /// Remove the most recent undo record
    pub fn pop_undo(&self) -> Option<UndoEntry> {
        self.lock().undo.pop()
    }

    /// Detach from the delta stream, keeping the current state
    pub fn freeze(&self) {
        self.lock().view.freeze();
    }
}

impl MirrorInner {
    fn record(&mut self, error: SessionError) {
        warn!(error = %error, "Mirror fell out of sync; freezing view");
        self.view.freeze();
        self.errors.push(error);
    }
}

impl DeltaReceiver for WaveletMirror {
    fn on_connection(
        &mut self,
        connect_version: &VersionId,
        last_modified_version: &VersionId,
        _unacknowledged_delta_version: Option<&VersionId>,
        catch_up_ops: Option<&[WaveletOperation]>,
    ) {
        let mut inner = self.lock();
        inner.view.freeze();

        if let Some(ops) = catch_up_ops {
            let at_connect =
                inner.view.version().map(|v| v.sequence) == Some(connect_version.sequence);
            if at_connect {
                if let Err(e) = inner.view.catch_up(ops, last_modified_version) {
                    inner.record(e);
                    return;
                }
            }
        }

        // A mirror without a snapshot adopts the server's version as is.
        if inner.view.version().is_none() {
            inner.view =
                WaveletView::snapshot(WaveletState::new(), Some(last_modified_version.clone()));
        }
        match inner.view.go_live(last_modified_version.clone()) {
            Ok(()) => debug!(version = %last_modified_version, "Mirror live"),
            Err(e) => inner.record(e),
        }
    }

    fn on_ack(&mut self, _ops_applied: usize, version: &VersionId) {
        let mut inner = self.lock();
        inner.last_acked = Some(version.clone());
        if inner.view.is_live() {
            if let Err(e) = inner.view.advance_to(version.clone()) {
                inner.record(e);
            }
        }
    }

    fn on_nack(&mut self, status: &ReturnStatus, version: u64) {
        self.lock().nacks.push((status.clone(), version));
    }

    fn on_commit(&mut self, version: u64) {
        let mut inner = self.lock();
        inner.last_committed = Some(inner.last_committed.map_or(version, |c| c.max(version)));
    }

    fn on_delta(&mut self, delta: &TransformedDelta) {
        let mut inner = self.lock();
        if !inner.view.is_live() {
            return;
        }
        let reversal = ReversalContext::new(delta.timestamp())
            .at_version(delta.applied_at_version().clone());
        match inner.view.apply_delta(delta, &reversal) {
            Ok(operations) => inner.undo.push(UndoEntry {
                version: delta.resulting_version().clone(),
                operations,
            }),
            Err(e) => inner.record(e),
        }
    }
}
