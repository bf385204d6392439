//! Shadow model (§3, §9 component 9): keyed collections of sessions,
//! windows, panes, clients, and key tables, owned exclusively by the
//! façade. Back-references (pane→window, window→session via session's
//! `windows` array, client→session) are lookup-only; only parent→child is
//! treated as ownership, matching §9's back-reference-and-cycles note.

pub mod client;
pub mod keytable;
pub mod pane;
pub mod session;
pub mod window;

pub use client::{Client, ClientSnapshot};
pub use keytable::{KeyBinding, KeyTable};
pub use pane::{Pane, PaneSnapshot};
pub use session::{Session, SessionSnapshot, StatusBar};
pub use window::{Window, WindowSnapshot};

use std::collections::HashMap;

pub type SessionId = String;
pub type WindowId = String;
pub type PaneId = String;
pub type ClientName = String;

/// The reserved placeholder session name (§6 "Reserved identifiers",
/// GLOSSARY "Temp session").
pub const TEMP_SESSION_NAME: &str = "wtc_tmux_temp";

#[derive(Debug, Default)]
pub struct Model {
    pub sessions: HashMap<SessionId, Session>,
    pub windows: HashMap<WindowId, Window>,
    pub panes: HashMap<PaneId, Pane>,
    pub clients: HashMap<ClientName, Client>,
    pub key_tables: HashMap<String, KeyTable>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty_of_sessions(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Looks up a key table by name (§3 "Key table" row).
    pub fn key_table(&self, name: &str) -> Option<&KeyTable> {
        self.key_tables.get(name)
    }

    /// The bindings currently known for `name`, or empty if the table
    /// hasn't been reloaded yet (§3 "Key binding" row).
    pub fn bindings_in(&self, name: &str) -> Vec<&KeyBinding> {
        self.key_tables
            .get(name)
            .map(|t| t.bindings.values().collect())
            .unwrap_or_default()
    }

    /// Links `pane` under `window`: records the pane in the window's
    /// ordered pane list (at the tail) unless already present.
    pub fn link_pane_to_window(&mut self, window_id: &WindowId, pane_id: &PaneId) {
        if let Some(window) = self.windows.get_mut(window_id) {
            if !window.panes.contains(pane_id) {
                window.panes.push(pane_id.clone());
            }
        }
    }

    pub fn unlink_pane(&mut self, window_id: &WindowId, pane_id: &PaneId) {
        if let Some(window) = self.windows.get_mut(window_id) {
            window.panes.retain(|p| p != pane_id);
            if window.active_pane.as_deref() == Some(pane_id.as_str()) {
                window.active_pane = None;
            }
        }
    }

    /// §8 universal invariant: every pane is reachable from its window and
    /// the window's pane list is acyclic (a `Vec` of unique ids is acyclic
    /// by construction; this checks the "unique" half).
    #[cfg(test)]
    pub fn check_pane_window_invariant(&self) -> bool {
        for pane in self.panes.values() {
            let Some(window) = self.windows.get(&pane.window) else {
                return false;
            };
            if !window.panes.contains(&pane.id) {
                return false;
            }
        }
        for window in self.windows.values() {
            let mut seen = std::collections::HashSet::new();
            for p in &window.panes {
                if !seen.insert(p) {
                    return false; // duplicate => cycle-prone
                }
            }
        }
        true
    }

    /// §8 universal invariant: `S.windows` has exactly `S.window_count`
    /// entries (trivially true by construction here) and contains
    /// `S.active_window` when set.
    #[cfg(test)]
    pub fn check_session_active_window_invariant(&self) -> bool {
        self.sessions.values().all(|s| match &s.active_window {
            Some(w) => s.windows.contains(w),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_and_unlink_pane() {
        let mut m = Model::new();
        m.windows.insert("@1".into(), Window::new("@1".into()));
        m.link_pane_to_window(&"@1".to_string(), &"%1".to_string());
        assert_eq!(m.windows["@1"].panes, vec!["%1".to_string()]);
        m.unlink_pane(&"@1".to_string(), &"%1".to_string());
        assert!(m.windows["@1"].panes.is_empty());
    }

    #[test]
    fn pane_window_invariant_holds_for_consistent_model() {
        let mut m = Model::new();
        m.windows.insert("@1".into(), Window::new("@1".into()));
        m.link_pane_to_window(&"@1".to_string(), &"%1".to_string());
        m.panes.insert(
            "%1".into(),
            Pane {
                id: "%1".into(),
                window: "@1".into(),
                pid: 100,
                active: true,
                in_mode: false,
                x: 0,
                y: 0,
                w: 80,
                h: 24,
            },
        );
        assert!(m.check_pane_window_invariant());
    }

    #[test]
    fn session_active_window_invariant() {
        let mut s = Session::new("$0".into(), "main".into());
        s.windows.push("@1".into());
        s.active_window = Some("@1".into());
        let mut m = Model::new();
        m.sessions.insert("$0".into(), s);
        assert!(m.check_session_active_window_invariant());
    }
}
