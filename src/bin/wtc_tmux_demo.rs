//! Demo: attach to a tmux server and print shadow-model events as they
//! happen, until Ctrl-C.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use wtc_tmux::model::{ClientSnapshot, PaneSnapshot, SessionSnapshot, WindowSnapshot};
use wtc_tmux::{Callbacks, CoreHandle, Tmux};

struct PrintingCallbacks;

impl Callbacks for PrintingCallbacks {
    fn new_session(&self, _core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        info!(id = %session.id, name = %session.name, "new session");
        0
    }

    fn session_closed(&self, _core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        info!(id = %session.id, name = %session.name, "session closed");
        0
    }

    fn session_window_changed(&self, _core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        info!(id = %session.id, active_window = ?session.active_window, "session active window changed");
        0
    }

    fn new_window(&self, _core: &CoreHandle, window: &WindowSnapshot) -> i32 {
        info!(id = %window.id, "new window");
        0
    }

    fn window_closed(&self, _core: &CoreHandle, window: &WindowSnapshot) -> i32 {
        info!(id = %window.id, "window closed");
        0
    }

    fn window_pane_changed(&self, _core: &CoreHandle, window: &WindowSnapshot) -> i32 {
        info!(id = %window.id, active_pane = ?window.active_pane, "window active pane changed");
        0
    }

    fn new_pane(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        info!(id = %pane.id, window = %pane.window, "new pane");
        0
    }

    fn pane_closed(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        info!(id = %pane.id, "pane closed");
        0
    }

    fn pane_resized(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        info!(id = %pane.id, w = pane.w, h = pane.h, x = pane.x, y = pane.y, "pane resized");
        0
    }

    fn pane_mode_changed(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        info!(id = %pane.id, in_mode = pane.in_mode, "pane mode changed");
        0
    }

    fn client_session_changed(&self, _core: &CoreHandle, client: &ClientSnapshot) -> i32 {
        info!(name = %client.name, session = %client.session, "client session changed");
        0
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let socket_name = args.get(1).map(|s| s.as_str());

    let tmux = Arc::new(Tmux::new(PrintingCallbacks));

    if let Some(name) = socket_name {
        if let Err(e) = tmux.set_socket_name(name).await {
            eprintln!("Error: failed to set socket name: {e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = tmux.connect().await {
        eprintln!("Error: failed to connect: {e}");
        std::process::exit(1);
    }

    info!("connected, watching for changes (Ctrl-C to stop)");
    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Ok(dump) = tmux.sessions_json().await {
        info!(sessions = %dump, "initial state");
    }

    let _ = tokio::signal::ctrl_c().await;
    tmux.disconnect().await;
    // Give the event loop a moment to notice the shutdown signal.
    tokio::time::sleep(Duration::from_millis(50)).await;
}
