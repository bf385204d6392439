//! Session entity (§3).

use serde::Serialize;

use super::{SessionId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusBar {
    Off,
    Top,
    Bottom,
}

impl StatusBar {
    /// Parses a `status`/`status-position` option pair the way
    /// `sessions_reload` does: `""` (unset/inherit) falls back to the
    /// caller-supplied default.
    pub fn from_options(status: &str, position: &str, default: StatusBar) -> StatusBar {
        if status == "off" {
            return StatusBar::Off;
        }
        match position {
            "top" => StatusBar::Top,
            "bottom" => StatusBar::Bottom,
            _ => default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub statusbar: StatusBar,
    pub prefix: Option<String>,
    pub prefix2: Option<String>,
    /// Independently owned; the same window id may repeat here (tmux
    /// "window linking") and may also appear in another session's array.
    pub windows: Vec<WindowId>,
    pub active_window: Option<WindowId>,
}

impl Session {
    pub fn new(id: SessionId, name: String) -> Self {
        Session {
            id,
            name,
            statusbar: StatusBar::Top,
            prefix: None,
            prefix2: None,
            windows: Vec::new(),
            active_window: None,
        }
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            statusbar: self.statusbar,
            window_count: self.window_count(),
            active_window: self.active_window.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub name: String,
    pub statusbar: StatusBar,
    pub window_count: usize,
    pub active_window: Option<WindowId>,
}
