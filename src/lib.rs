//! Tmux control-mode tracking subsystem.
//!
//! Attaches to a tmux server over `-CC` control mode, maintains a shadow
//! model of its sessions/windows/panes/clients/key-tables, and notifies a
//! host (a Wayland compositor embedding tmux as its multiplexing layer)
//! of changes via a callback trait. See [`facade::Tmux`] for the entry
//! point.

pub mod callbacks;
pub mod config;
pub mod control;
pub mod error;
pub mod facade;
pub mod launcher;
pub mod model;
pub mod refresh;
pub mod reload;
pub mod ring;
pub mod supervisor;

pub use callbacks::{Callbacks, NoopCallbacks};
pub use error::{Error, Result};
pub use facade::{CoreHandle, Tmux};
pub use model::{ClientSnapshot, PaneSnapshot, SessionSnapshot, WindowSnapshot};
