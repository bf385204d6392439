//! End-to-end scenarios (§8) against a real tmux binary. Ignored by
//! default since they need tmux on `PATH` and spawn a throwaway server on
//! a private socket; run with `cargo test -- --ignored`.

use std::process::Command;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wtc_tmux::model::{ClientSnapshot, PaneSnapshot, SessionSnapshot, WindowSnapshot};
use wtc_tmux::{Callbacks, CoreHandle, Error, Tmux};

fn unique_socket() -> String {
    static COUNTER: AtomicI64 = AtomicI64::new(0);
    format!(
        "wtc-tmux-test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

fn tmux_available() -> bool {
    Command::new("tmux")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn kill_socket(socket: &str) {
    let _ = Command::new("tmux").args(["-L", socket, "kill-server"]).output();
}

#[derive(Default)]
struct RecordingCallbacks {
    new_sessions: Mutex<Vec<String>>,
    closed_sessions: Mutex<Vec<String>>,
    new_panes: Mutex<Vec<String>>,
    resized_panes: Mutex<Vec<String>>,
}

impl Callbacks for RecordingCallbacks {
    fn new_session(&self, _core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        self.new_sessions.lock().unwrap().push(session.name.clone());
        0
    }

    fn session_closed(&self, _core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        self.closed_sessions.lock().unwrap().push(session.name.clone());
        0
    }

    fn new_pane(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        self.new_panes.lock().unwrap().push(pane.id.clone());
        0
    }

    fn pane_resized(&self, _core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        self.resized_panes.lock().unwrap().push(pane.id.clone());
        0
    }

    fn window_pane_changed(&self, _core: &CoreHandle, _window: &WindowSnapshot) -> i32 {
        0
    }

    fn client_session_changed(&self, _core: &CoreHandle, _client: &ClientSnapshot) -> i32 {
        0
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
#[ignore]
async fn empty_server_bootstraps_temp_session_without_new_session_callback() {
    if !tmux_available() {
        eprintln!("skipping: tmux not on PATH");
        return;
    }
    let socket = unique_socket();
    let callbacks = Arc::new(RecordingCallbacks::default());
    let tmux = {
        let t = Tmux::new(CallbacksHandle(callbacks.clone()));
        t.set_socket_name(&socket).await.unwrap();
        t
    };

    tmux.connect().await.unwrap();
    let bootstrapped = wait_until(|| !tmux_sessions_blocking(&socket).is_empty(), Duration::from_secs(3)).await;
    assert!(bootstrapped, "temp session never appeared");

    // Give the second reload pass (triggered by %sessions-changed) time to
    // run and confirm it produced no NewSession callback for the temp
    // session itself.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(callbacks.new_sessions.lock().unwrap().is_empty());

    tmux.disconnect().await;
    kill_socket(&socket);
}

#[tokio::test]
#[ignore]
async fn real_session_appearing_fires_new_session_and_kills_temp() {
    if !tmux_available() {
        eprintln!("skipping: tmux not on PATH");
        return;
    }
    let socket = unique_socket();
    let callbacks = Arc::new(RecordingCallbacks::default());
    let tmux = {
        let t = Tmux::new(CallbacksHandle(callbacks.clone()));
        t.set_socket_name(&socket).await.unwrap();
        t
    };
    tmux.connect().await.unwrap();
    wait_until(|| !tmux_sessions_blocking(&socket).is_empty(), Duration::from_secs(3)).await;

    let status = Command::new("tmux")
        .args(["-L", &socket, "new-session", "-d", "-s", "work"])
        .status()
        .unwrap();
    assert!(status.success());

    let saw_work = wait_until(
        || callbacks.new_sessions.lock().unwrap().iter().any(|n| n == "work"),
        Duration::from_secs(3),
    )
    .await;
    assert!(saw_work, "NewSession(work) never fired");

    let temp_closed = wait_until(
        || !callbacks.closed_sessions.lock().unwrap().is_empty(),
        Duration::from_secs(3),
    )
    .await;
    assert!(temp_closed, "SessionClosed(temp) never fired");
    assert!(!callbacks.new_sessions.lock().unwrap().iter().any(|n| n == "wtc_tmux_temp"));

    tmux.disconnect().await;
    kill_socket(&socket);
}

#[tokio::test]
#[ignore]
async fn pane_split_fires_new_pane_then_resized() {
    if !tmux_available() {
        eprintln!("skipping: tmux not on PATH");
        return;
    }
    let socket = unique_socket();
    Command::new("tmux")
        .args(["-L", &socket, "new-session", "-d", "-s", "work", "-x", "80", "-y", "24"])
        .status()
        .unwrap();

    let callbacks = Arc::new(RecordingCallbacks::default());
    let tmux = {
        let t = Tmux::new(CallbacksHandle(callbacks.clone()));
        t.set_socket_name(&socket).await.unwrap();
        t
    };
    tmux.connect().await.unwrap();
    let start = tokio::time::Instant::now();
    while tmux.sessions().await.is_empty() && start.elapsed() < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    Command::new("tmux")
        .args(["-L", &socket, "split-window", "-h", "-t", "work"])
        .status()
        .unwrap();

    let got_new_pane = wait_until(
        || !callbacks.new_panes.lock().unwrap().is_empty(),
        Duration::from_secs(3),
    )
    .await;
    assert!(got_new_pane, "NewPane never fired");

    let got_resize = wait_until(
        || !callbacks.resized_panes.lock().unwrap().is_empty(),
        Duration::from_secs(3),
    )
    .await;
    assert!(got_resize, "PaneResized never fired");

    tmux.disconnect().await;
    kill_socket(&socket);
}

#[tokio::test]
#[ignore]
async fn version_gate_rejects_stubbed_old_tmux() {
    // Stubs `tmux -V` via a fake binary on PATH reporting an old version,
    // so this test doesn't depend on the real tmux's installed version.
    let dir = std::env::temp_dir().join(format!("wtc-tmux-fake-bin-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let fake_tmux = dir.join("tmux");
    std::fs::write(
        &fake_tmux,
        "#!/bin/sh\nif [ \"$1\" = \"-V\" ]; then echo 'tmux 2.3'; exit 0; fi\nexit 1\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&fake_tmux).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&fake_tmux, perms).unwrap();
    }

    let tmux = Tmux::new(wtc_tmux::NoopCallbacks);
    tmux.set_bin_file(fake_tmux.to_string_lossy().to_string())
        .await
        .unwrap();

    let result = tmux.connect().await;
    assert!(matches!(result, Err(Error::VersionTooOld(_))));
    assert!(!tmux.is_connected());

    let _ = std::fs::remove_dir_all(&dir);
}

fn tmux_sessions_blocking(socket: &str) -> Vec<String> {
    Command::new("tmux")
        .args(["-L", socket, "list-sessions", "-F", "#{session_name}"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Wraps an `Arc<RecordingCallbacks>` so it can implement `Callbacks`
/// without fighting the orphan rule on `Arc<T>` directly.
struct CallbacksHandle(Arc<RecordingCallbacks>);

impl Callbacks for CallbacksHandle {
    fn new_session(&self, core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        self.0.new_session(core, session)
    }
    fn session_closed(&self, core: &CoreHandle, session: &SessionSnapshot) -> i32 {
        self.0.session_closed(core, session)
    }
    fn new_pane(&self, core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        self.0.new_pane(core, pane)
    }
    fn pane_resized(&self, core: &CoreHandle, pane: &PaneSnapshot) -> i32 {
        self.0.pane_resized(core, pane)
    }
}

