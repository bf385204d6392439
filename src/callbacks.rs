//! Host callbacks (§6, §9 "Callback storage").
//!
//! The source's typedef'd struct of function pointers becomes a trait with
//! one method per event kind, each defaulting to a no-op — exactly the
//! "options struct of nullable handlers" alternative §9 sanctions. A
//! non-zero return aborts the remaining closure dispatch for that pass.

use crate::facade::CoreHandle;
use crate::model::{ClientSnapshot, PaneSnapshot, SessionSnapshot, WindowSnapshot};

pub trait Callbacks: Send + Sync {
    fn new_session(&self, _core: &CoreHandle, _session: &SessionSnapshot) -> i32 {
        0
    }
    fn session_closed(&self, _core: &CoreHandle, _session: &SessionSnapshot) -> i32 {
        0
    }
    fn session_window_changed(&self, _core: &CoreHandle, _session: &SessionSnapshot) -> i32 {
        0
    }
    fn new_window(&self, _core: &CoreHandle, _window: &WindowSnapshot) -> i32 {
        0
    }
    fn window_closed(&self, _core: &CoreHandle, _window: &WindowSnapshot) -> i32 {
        0
    }
    fn window_pane_changed(&self, _core: &CoreHandle, _window: &WindowSnapshot) -> i32 {
        0
    }
    fn new_pane(&self, _core: &CoreHandle, _pane: &PaneSnapshot) -> i32 {
        0
    }
    fn pane_closed(&self, _core: &CoreHandle, _pane: &PaneSnapshot) -> i32 {
        0
    }
    fn pane_resized(&self, _core: &CoreHandle, _pane: &PaneSnapshot) -> i32 {
        0
    }
    fn pane_mode_changed(&self, _core: &CoreHandle, _pane: &PaneSnapshot) -> i32 {
        0
    }
    fn client_session_changed(&self, _core: &CoreHandle, _client: &ClientSnapshot) -> i32 {
        0
    }
}

/// A callback set where every handler is a no-op, equivalent to "missing
/// handler" in the spec's terms.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callbacks_never_abort() {
        let cb = NoopCallbacks;
        let handle = CoreHandle::dangling_for_test();
        let session = SessionSnapshot {
            id: "$0".into(),
            name: "main".into(),
            statusbar: crate::model::StatusBar::Top,
            window_count: 0,
            active_window: None,
        };
        assert_eq!(cb.new_session(&handle, &session), 0);
    }
}
