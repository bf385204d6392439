//! Window entity (§3).

use serde::Serialize;

use super::{PaneId, WindowId};

#[derive(Debug, Clone)]
pub struct Window {
    pub id: WindowId,
    /// Ordered pane list (the spec's "head of pane linked list"; Rust
    /// models the chain as an ordered `Vec` rather than hand-rolled
    /// prev/next pointers).
    pub panes: Vec<PaneId>,
    pub active_pane: Option<PaneId>,
}

impl Window {
    pub fn new(id: WindowId) -> Self {
        Window {
            id,
            panes: Vec::new(),
            active_pane: None,
        }
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            id: self.id.clone(),
            pane_count: self.pane_count(),
            active_pane: self.active_pane.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub id: WindowId,
    pub pane_count: usize,
    pub active_pane: Option<PaneId>,
}
