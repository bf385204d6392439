//! Public façade (§4.7, §9 component 13): the single entry point a host
//! compositor holds onto. Wires `Config`, the shadow `Model`, the CC map,
//! the `Supervisor`, the `RefreshCoordinator`, and the host's `Callbacks`
//! into one event loop, and exposes lifecycle, configuration, `exec`, and
//! lookup operations.
//!
//! The spec's manual ref/unref pair is just `Clone`/`Drop` on `Tmux` here:
//! it's an `Arc<Inner>` handle, so the host can hold as many clones as it
//! wants and the last one dropped tears the instance down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, error, warn};

use crate::callbacks::Callbacks;
use crate::config::{check_version, Config};
use crate::control::cc::{cc_launch, Cc};
use crate::control::parser::Notification;
use crate::control::plexer::cc_exec;
use crate::error::{Error, Result};
use crate::launcher::{fork_tmux, WantPipes};
use crate::model::{Model, SessionId};
use crate::reload::options::{build_args, strip_trailing_newline, OptionScope, OptionTarget};
use crate::reload::Runtime as ReloadRuntime;
use crate::refresh::{run_pass, Closure, ClosureQueue, RefreshCoordinator, RefreshFlags, ReloadOps};
use crate::ring::{read_available, Framing, Sink};
use crate::supervisor::{waitpid_bounded, Supervisor};

/// Everything the event loop and `exec` need, behind one lock-per-field so
/// `dispatch`, `exec`, and the reload adapters never need each other's
/// locks simultaneously.
struct Inner {
    config: Mutex<Config>,
    model: Mutex<Model>,
    ccs: Mutex<HashMap<u32, Cc>>,
    children: Mutex<HashMap<u32, Child>>,
    coordinator: Arc<RefreshCoordinator>,
    notifications_tx: Mutex<Option<mpsc::UnboundedSender<Notification>>>,
    callbacks: Box<dyn Callbacks>,
    shutdown: Notify,
    connected: AtomicBool,
}

/// A cloneable, reference-counted handle to one tracked tmux instance
/// (GLOSSARY "core" / `wtc_tmux_t`). Dropping the last clone tears the
/// instance's background tasks and CCs down.
#[derive(Clone)]
pub struct Tmux(Arc<Inner>);

/// The value passed to every callback invocation (§6). Currently just the
/// façade handle itself; a thin alias keeps the callback signatures
/// readable and leaves room to narrow what a callback can do later without
/// touching every call site.
pub type CoreHandle = Tmux;

impl Tmux {
    /// Builds an unconnected instance with the given callback set. Nothing
    /// is spawned until [`Tmux::connect`].
    pub fn new(callbacks: impl Callbacks + 'static) -> Self {
        Tmux(Arc::new(Inner {
            config: Mutex::new(Config::new()),
            model: Mutex::new(Model::new()),
            ccs: Mutex::new(HashMap::new()),
            children: Mutex::new(HashMap::new()),
            coordinator: Arc::new(RefreshCoordinator::new()),
            notifications_tx: Mutex::new(None),
            callbacks: Box::new(callbacks),
            shutdown: Notify::new(),
            connected: AtomicBool::new(false),
        }))
    }

    /// A handle with no backing state, for constructing a `CoreHandle` in
    /// tests that only need to satisfy a callback's signature.
    #[doc(hidden)]
    pub fn dangling_for_test() -> Self {
        Tmux::new(crate::callbacks::NoopCallbacks)
    }

    // ---- configuration (§4.1, delegates to Config's busy guards) ----

    pub async fn set_bin_file(&self, path: impl Into<String>) -> Result<()> {
        self.0.config.lock().await.set_bin_file(path)
    }

    pub async fn set_socket_name(&self, name: impl Into<String>) -> Result<()> {
        self.0.config.lock().await.set_socket_name(name)
    }

    pub async fn set_socket_path(&self, path: impl Into<String>) -> Result<()> {
        self.0.config.lock().await.set_socket_path(path)
    }

    pub async fn set_config_file(&self, path: impl Into<String>) -> Result<()> {
        self.0.config.lock().await.set_config_file(path)
    }

    pub async fn set_timeout_ms(&self, timeout_ms: u64) -> Result<()> {
        self.0.config.lock().await.set_timeout_ms(timeout_ms)
    }

    /// Sets the viewport size. While connected, also pushes
    /// `refresh-client -C W,H` to every live CC (§5).
    pub async fn set_size(&self, width: u16, height: u16) -> Result<()> {
        self.0.config.lock().await.set_size(width, height)?;
        if self.0.connected.load(Ordering::Acquire) {
            let ccs: Vec<Cc> = self.0.ccs.lock().await.values().cloned().collect();
            for cc in ccs {
                if cc.is_alive() {
                    let _ = cc
                        .write_line(&format!("refresh-client -C {width},{height}"))
                        .await;
                }
            }
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::Acquire)
    }

    // ---- lifecycle (§4.2, §4.3) ----

    /// Forks a one-shot `tmux -V`, version-gates it, then starts the
    /// background event loop that drives refreshes and CC supervision.
    /// Bootstraps by queuing an initial Sessions refresh, which (per
    /// §4.8/§4.9) recursively covers windows/panes/clients and launches the
    /// temp CC the moment the server turns out to have zero sessions.
    pub async fn connect(&self) -> Result<()> {
        if self.0.connected.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy("connect"));
        }

        if let Err(e) = self.version_gate().await {
            self.0.connected.store(false, Ordering::Release);
            return Err(e);
        }
        self.0.config.lock().await.mark_connected(true);

        let supervisor = match Supervisor::new() {
            Ok(s) => s,
            Err(e) => {
                self.0.connected.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *self.0.notifications_tx.lock().await = Some(tx);

        let handle = self.clone();
        tokio::spawn(async move {
            handle.event_loop(supervisor, rx).await;
        });

        self.0.coordinator.queue_refresh(RefreshFlags::SESSIONS);
        Ok(())
    }

    async fn version_gate(&self) -> Result<()> {
        let (argv, timeout_ms) = {
            let config = self.0.config.lock().await;
            (config.argv(&["-V".to_string()]), config.timeout_ms())
        };
        let mut launched = fork_tmux(&argv, WantPipes { stdout: true, ..Default::default() })?;
        let status = waitpid_bounded(&mut launched.child, Duration::from_millis(timeout_ms)).await?;
        let mut out = Vec::new();
        if let Some(mut stdout) = launched.stdout.take() {
            let mut sink = Sink::Heap(&mut out);
            let _ = read_available(&mut stdout, Framing::Raw, &mut sink).await;
        }
        if !status.success() {
            return Err(Error::Invalid("tmux -V exited non-zero".into()));
        }
        check_version(&String::from_utf8_lossy(&out))
    }

    /// Tears the instance down: stops the event loop, kills every live CC.
    /// The shadow model and configuration are left as-is so a subsequent
    /// `connect()` has somewhere sane to start diffing from.
    pub async fn disconnect(&self) {
        if !self.0.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.0.shutdown.notify_waiters();
        self.0.config.lock().await.mark_connected(false);

        let mut children = self.0.children.lock().await;
        for (_, mut child) in children.drain() {
            let _ = child.kill().await;
        }
        self.0.ccs.lock().await.clear();
        *self.0.notifications_tx.lock().await = None;
    }

    // ---- exec (§4.7) ----

    /// Runs `args` against the server: via the primary (non-temp) CC's
    /// plexer if one is attached, otherwise by forking a one-shot tmux
    /// process and collecting its stdout.
    pub async fn exec(&self, args: &[String]) -> Result<String> {
        let primary = self.primary_cc().await;
        if let Some(cc) = primary {
            let timeout_ms = self.0.config.lock().await.timeout_ms();
            let reply = cc_exec(&cc, args, Duration::from_millis(timeout_ms)).await?;
            let text = String::from_utf8_lossy(&reply.payload).into_owned();
            if reply.is_error {
                return Err(Error::Invalid(text));
            }
            return Ok(text);
        }

        let (argv, timeout_ms) = {
            let config = self.0.config.lock().await;
            (config.argv(args), config.timeout_ms())
        };
        let mut launched = fork_tmux(&argv, WantPipes { stdout: true, stderr: true, ..Default::default() })?;
        let status = waitpid_bounded(&mut launched.child, Duration::from_millis(timeout_ms)).await?;
        let mut out = Vec::new();
        if let Some(mut stdout) = launched.stdout.take() {
            let mut sink = Sink::Heap(&mut out);
            let _ = read_available(&mut stdout, Framing::CString, &mut sink).await;
        }
        let text = String::from_utf8_lossy(&out).trim_end_matches('\0').to_string();
        if !status.success() {
            return Err(Error::Invalid(text));
        }
        Ok(text)
    }

    async fn primary_cc(&self) -> Option<Cc> {
        self.0
            .ccs
            .lock()
            .await
            .values()
            .find(|cc| !cc.temp && cc.is_alive())
            .cloned()
    }

    // ---- lookups (§4.7) ----

    pub async fn session(&self, id: &str) -> Option<crate::model::SessionSnapshot> {
        self.0.model.lock().await.sessions.get(id).map(|s| s.snapshot())
    }

    pub async fn window(&self, id: &str) -> Option<crate::model::WindowSnapshot> {
        self.0.model.lock().await.windows.get(id).map(|w| w.snapshot())
    }

    pub async fn pane(&self, id: &str) -> Option<crate::model::PaneSnapshot> {
        self.0.model.lock().await.panes.get(id).map(|p| p.snapshot())
    }

    pub async fn client(&self, name: &str) -> Option<crate::model::ClientSnapshot> {
        self.0.model.lock().await.clients.get(name).map(|c| c.snapshot())
    }

    pub async fn sessions(&self) -> Vec<crate::model::SessionSnapshot> {
        self.0.model.lock().await.sessions.values().map(|s| s.snapshot()).collect()
    }

    /// Serializes the current session list to JSON, for a host that wants
    /// a one-shot state dump (a debug endpoint, a log line) rather than
    /// driving the model through individual lookups.
    pub async fn sessions_json(&self) -> Result<String> {
        let sessions = self.sessions().await;
        serde_json::to_string(&sessions).map_err(|e| Error::Invalid(e.to_string()))
    }

    // ---- key tables (§3 "Key table"/"Key binding" rows) ----

    /// Reloads `name` via `list-keys -T <name>` and returns its current
    /// bindings. An unknown table name and a real table with zero bindings
    /// both come back as an empty `Vec`.
    pub async fn key_table(&self, name: &str) -> Result<Option<crate::model::KeyTable>> {
        let mut rt = RuntimeAdapter { tmux: self };
        let mut model = self.0.model.lock().await;
        crate::reload::keys::keys_reload(&mut model, &mut rt, name).await?;
        Ok(model.key_table(name).cloned())
    }

    /// Reloads `name` and returns just its bindings, for a caller that
    /// doesn't need the table wrapper.
    pub async fn bindings_in(&self, name: &str) -> Result<Vec<crate::model::KeyBinding>> {
        let mut rt = RuntimeAdapter { tmux: self };
        let mut model = self.0.model.lock().await;
        crate::reload::keys::keys_reload(&mut model, &mut rt, name).await?;
        Ok(model.bindings_in(name).into_iter().cloned().collect())
    }

    // ---- CC lifecycle (§4.4) ----

    /// Launches a CC for `session` (`None` = temp session), applying the
    /// closing rule: if a temp CC exists and we're about to attach a real
    /// session, the temp CC's session is killed first so tmux doesn't keep
    /// an empty placeholder session alive once a real one exists.
    async fn launch_cc_with_closing_rule(&self, session: Option<SessionId>) -> Result<()> {
        if session.is_some() {
            let temp = {
                let ccs = self.0.ccs.lock().await;
                ccs.values().find(|cc| cc.temp).cloned()
            };
            if let Some(temp_cc) = temp {
                let timeout_ms = self.0.config.lock().await.timeout_ms();
                let _ = cc_exec(
                    &temp_cc,
                    &["kill-session".to_string()],
                    Duration::from_millis(timeout_ms),
                )
                .await;
            }
        }

        let config = self.0.config.lock().await.clone();
        let tx = self
            .0
            .notifications_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Invalid("launch_cc called before connect".into()))?;
        let handle = cc_launch(&config, session, self.0.coordinator.clone(), tx).await?;
        let pid = handle.cc.pid;
        self.0.ccs.lock().await.insert(pid, handle.cc);
        self.0.children.lock().await.insert(pid, handle.child);
        Ok(())
    }

    // ---- event loop ----

    async fn event_loop(
        self,
        mut supervisor: Supervisor,
        mut notifications_rx: mpsc::UnboundedReceiver<Notification>,
    ) {
        loop {
            tokio::select! {
                _ = self.0.coordinator.wait() => {
                    self.run_refresh_pass().await;
                }
                _ = supervisor.wait_for_signal() => {
                    self.handle_sigchld(&mut supervisor).await;
                }
                maybe_notif = notifications_rx.recv() => {
                    if maybe_notif.is_none() {
                        break; // all CC reader tasks gone
                    }
                    // Notifications already drove queue_refresh in the CC
                    // reader; nothing else to do with them here.
                }
                _ = self.0.shutdown.notified() => break,
            }
        }
        debug!("event loop exiting");
    }

    async fn run_refresh_pass(&self) {
        let pending = self.0.coordinator.take_pending();
        if pending.is_empty() {
            return;
        }
        let mut ops = ReloadOpsAdapter { tmux: self };
        match run_pass(&self.0.coordinator, pending, &mut ops).await {
            Ok(mut closures) => {
                let drained = closures.drain();
                self.dispatch_closures(drained).await;
            }
            Err(e) => {
                error!(error = %e, "refresh pass failed");
            }
        }
    }

    async fn handle_sigchld(&self, supervisor: &mut Supervisor) {
        let reaped = {
            let mut children = self.0.children.lock().await;
            supervisor.reap_all(&mut children)
        };
        if reaped.is_empty() {
            return;
        }
        let mut ccs = self.0.ccs.lock().await;
        let mut a_non_temp_cc_just_died = false;
        for r in &reaped {
            if let Some(cc) = ccs.remove(&r.pid) {
                if !cc.temp {
                    a_non_temp_cc_just_died = true;
                }
            }
        }
        let any_non_temp_left = ccs.values().any(|cc| !cc.temp);
        drop(ccs);
        if a_non_temp_cc_just_died && !any_non_temp_left {
            self.0.coordinator.queue_refresh(RefreshFlags::SESSIONS);
        }
    }

    /// Invokes the host callback matching each closure in order, applying
    /// the temp-session suppression and the new-session CC-launch ordering
    /// (§4.9 "Detail (new-pane ordering)": the CC for a newly observed
    /// session is launched *before* the user's `new_session` callback
    /// fires). A non-zero callback return aborts the rest of this pass.
    async fn dispatch_closures(&self, closures: Vec<Closure>) {
        let core: CoreHandle = self.clone();
        for closure in closures {
            let rc = match closure {
                Closure::NewSession(s) => {
                    let is_temp = crate::reload::sessions::is_temp_session_name(&s.name);
                    if !is_temp {
                        if let Err(e) = self.launch_cc_with_closing_rule(Some(s.id.clone())).await
                        {
                            warn!(error = %e, session = %s.id, "cc_launch for new session failed");
                        }
                    }
                    if is_temp {
                        continue;
                    }
                    self.0.callbacks.new_session(&core, &s)
                }
                Closure::SessionClosed(s) => {
                    if crate::reload::sessions::is_temp_session_name(&s.name) {
                        continue;
                    }
                    self.0.callbacks.session_closed(&core, &s)
                }
                Closure::SessionWindowChanged(s) => {
                    self.0.callbacks.session_window_changed(&core, &s)
                }
                Closure::NewWindow(w) => self.0.callbacks.new_window(&core, &w),
                Closure::WindowClosed(w) => self.0.callbacks.window_closed(&core, &w),
                Closure::WindowPaneChanged(w) => self.0.callbacks.window_pane_changed(&core, &w),
                Closure::NewPane(p) => self.0.callbacks.new_pane(&core, &p),
                Closure::PaneClosed(p) => self.0.callbacks.pane_closed(&core, &p),
                Closure::PaneResized(p) => self.0.callbacks.pane_resized(&core, &p),
                Closure::PaneModeChanged(p) => self.0.callbacks.pane_mode_changed(&core, &p),
                Closure::ClientSessionChanged(c) => {
                    self.0.callbacks.client_session_changed(&core, &c)
                }
            };
            if rc != 0 {
                break;
            }
        }
    }
}

/// Bridges the low-level [`ReloadRuntime`] trait (one tmux round trip at a
/// time) to the façade's `exec`/CC machinery.
struct RuntimeAdapter<'a> {
    tmux: &'a Tmux,
}

#[async_trait::async_trait]
impl<'a> ReloadRuntime for RuntimeAdapter<'a> {
    async fn list(&mut self, args: &[String]) -> Result<Vec<String>> {
        match self.tmux.exec(args).await {
            Ok(out) => Ok(out.lines().filter(|l| !l.is_empty()).map(String::from).collect()),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn get_option(
        &mut self,
        name: &str,
        target: Option<&str>,
        scope: OptionScope,
        kind: OptionTarget,
    ) -> Result<String> {
        let args = build_args(name, target, scope, kind);
        let out = self.tmux.exec(&args).await.unwrap_or_default();
        Ok(strip_trailing_newline(&out).to_string())
    }

    async fn launch_cc(&mut self, session: Option<SessionId>) -> Result<()> {
        self.tmux.launch_cc_with_closing_rule(session).await
    }
}

/// Bridges the cascading [`ReloadOps`] trait (§4.9 precedence dispatch) to
/// the four `reload::*` free functions, each locking the model for its own
/// diff-and-update pass.
struct ReloadOpsAdapter<'a> {
    tmux: &'a Tmux,
}

#[async_trait::async_trait]
impl<'a> ReloadOps for ReloadOpsAdapter<'a> {
    async fn sessions_reload(&mut self) -> Result<ClosureQueue> {
        let mut model = self.tmux.0.model.lock().await;
        let mut rt = RuntimeAdapter { tmux: self.tmux };
        crate::reload::sessions::sessions_reload(&mut model, &mut rt).await
    }

    async fn windows_reload(&mut self) -> Result<ClosureQueue> {
        let mut model = self.tmux.0.model.lock().await;
        let mut rt = RuntimeAdapter { tmux: self.tmux };
        crate::reload::windows::windows_reload(&mut model, &mut rt).await
    }

    async fn panes_reload(&mut self) -> Result<ClosureQueue> {
        let mut model = self.tmux.0.model.lock().await;
        let mut rt = RuntimeAdapter { tmux: self.tmux };
        crate::reload::panes::panes_reload(&mut model, &mut rt).await
    }

    async fn clients_reload(&mut self) -> Result<ClosureQueue> {
        let mut model = self.tmux.0.model.lock().await;
        let mut rt = RuntimeAdapter { tmux: self.tmux };
        crate::reload::clients::clients_reload(&mut model, &mut rt).await
    }
}
