/*
    core_session - the session's view of a wavelet

    WaveletView is a small state machine: a Static snapshot, or a Live state
    linked to the delta stream. go_live and freeze are the only transitions.
    WaveletMirror is a channel receiver that keeps a Live view current.
*/

pub mod errors;
pub mod mirror;
pub mod view;

pub use errors::{SessionError, SessionResult};
pub use mirror::{UndoEntry, WaveletMirror};
pub use view::WaveletView;
