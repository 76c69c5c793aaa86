/*
    core_ops - Wavelet operations and deltas

    An operation is one atomic wavelet mutation; a delta is an ordered,
    author-attributed batch of operations applied as one unit. The
    synchronization channel carries deltas as opaque payloads; the document
    layer uses apply/reverse for undo and for re-deriving edits after a
    rebase.

    Reversal law: applying a delta and then its reverse operations (the
    per-operation inverses in opposite order) restores the prior state.
*/

pub mod context;
pub mod delta;
pub mod doc_op;
pub mod errors;
pub mod operation;
pub mod participant;
pub mod state;

pub use context::{OperationContext, ReversalContext};
pub use delta::{ClientDelta, TransformedDelta};
pub use doc_op::{DocOp, DocOpBuilder, DocOpComponent};
pub use errors::{OperationError, OperationResult};
pub use operation::{ContributorMethod, WaveletOperation};
pub use participant::ParticipantId;
pub use state::{BlipData, WaveletState};
