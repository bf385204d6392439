//! Pane entity (§3).

use serde::Serialize;

use super::{PaneId, WindowId};

#[derive(Debug, Clone)]
pub struct Pane {
    pub id: PaneId,
    /// Owning window. Non-owning lookup reference (§3 ownership semantics).
    pub window: WindowId,
    pub pid: i32,
    pub active: bool,
    pub in_mode: bool,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Pane {
    pub fn geometry(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.w, self.h)
    }

    pub fn snapshot(&self) -> PaneSnapshot {
        PaneSnapshot {
            id: self.id.clone(),
            window: self.window.clone(),
            pid: self.pid,
            active: self.active,
            in_mode: self.in_mode,
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }
}

/// Immutable snapshot handed to host callbacks (§6: `(core_handle,
/// entity_snapshot)`).
#[derive(Debug, Clone, Serialize)]
pub struct PaneSnapshot {
    pub id: PaneId,
    pub window: WindowId,
    pub pid: i32,
    pub active: bool,
    pub in_mode: bool,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}
