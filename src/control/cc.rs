//! Control client (§4.4, §9 component 5).
//!
//! A CC wraps one long-running `tmux -CC attach-session`/`new-session`
//! child. The spec's hand-rolled refcount (façade + event source) becomes
//! `Arc<CcInner>`: the façade's CC map and the reader task each hold a
//! clone, and the record is freed once both drop it — no manual
//! ref/unref bookkeeping needed in Rust.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::config::Config;
use crate::control::parser::{CommandReply, Event, Notification, Parser};
use crate::error::{Error, Result};
use crate::model::SessionId;
use crate::refresh::RefreshCoordinator;
use crate::ring::{read_available, Framing, Ring, Sink};

/// One attached control-mode tmux child (GLOSSARY "CC").
pub struct CcInner {
    pub pid: u32,
    pub session: Option<SessionId>,
    pub temp: bool,
    stdin: Mutex<ChildStdin>,
    pending_reply: Mutex<Option<oneshot::Sender<CommandReply>>>,
    /// Set on launch; cleared once the reader task has discarded the
    /// startup reply tmux emits at attach (§4.4, §4.6).
    compensate: AtomicBool,
    alive: AtomicBool,
}

pub type Cc = Arc<CcInner>;

impl CcInner {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await.map_err(Error::Io)?;
        if !line.ends_with('\n') {
            stdin.write_all(b"\n").await.map_err(Error::Io)?;
        }
        stdin.flush().await.map_err(Error::Io)?;
        Ok(())
    }

    /// Installs a temporary pending-reply waiter, returning the previous
    /// one so the caller (the plexer) can restore it on exit (§4.6).
    pub(crate) async fn install_pending(
        &self,
        tx: oneshot::Sender<CommandReply>,
    ) -> Option<oneshot::Sender<CommandReply>> {
        self.pending_reply.lock().await.replace(tx)
    }

    pub(crate) async fn take_pending(&self) -> Option<oneshot::Sender<CommandReply>> {
        self.pending_reply.lock().await.take()
    }

    pub(crate) async fn restore_pending(&self, prev: Option<oneshot::Sender<CommandReply>>) {
        *self.pending_reply.lock().await = prev;
    }
}

/// Everything the launcher hands back: the shared record plus the process
/// handle the supervisor reaps.
pub struct CcHandle {
    pub cc: Cc,
    pub child: Child,
}

/// Launches a CC. `session = None` starts a temp session
/// (`new-session -s <TEMP_SESSION_NAME>`); `Some(id)` attaches to it
/// (`attach-session -t <id>`). Immediately issues `refresh-client -C W,H`
/// to lock the server to the configured viewport, and sets `compensate`
/// so the first reply (tmux's empty startup reply) is discarded rather
/// than handed to the first real caller.
pub async fn cc_launch(
    config: &Config,
    session: Option<SessionId>,
    coordinator: Arc<RefreshCoordinator>,
    notifications: mpsc::UnboundedSender<Notification>,
) -> Result<CcHandle> {
    let temp = session.is_none();
    let mut args = vec!["-CC".to_string()];
    match &session {
        Some(id) => {
            args.push("attach-session".into());
            args.push("-t".into());
            args.push(id.clone());
        }
        None => {
            args.push("new-session".into());
            args.push("-s".into());
            args.push(crate::model::TEMP_SESSION_NAME.into());
        }
    }
    let argv = config.argv(&args);

    let want = crate::launcher::WantPipes {
        stdin: true,
        stdout: true,
        stderr: false,
    };
    let launched = crate::launcher::fork_tmux(&argv, want)?;
    let pid = launched.pid;
    let mut child = launched.child;
    let stdin = launched
        .stdin
        .ok_or_else(|| Error::Invalid("cc_launch: missing stdin pipe".into()))?;
    let stdout = launched
        .stdout
        .ok_or_else(|| Error::Invalid("cc_launch: missing stdout pipe".into()))?;

    let cc = Arc::new(CcInner {
        pid,
        session: session.clone(),
        temp,
        stdin: Mutex::new(stdin),
        pending_reply: Mutex::new(None),
        compensate: AtomicBool::new(true),
        alive: AtomicBool::new(true),
    });

    let size = config.size();
    cc.write_line(&format!(
        "refresh-client -C {},{}",
        size.width, size.height
    ))
    .await?;

    spawn_reader(cc.clone(), stdout, coordinator, notifications);

    // `child` is kept by the caller (facade) for supervision; we don't
    // await it here.
    debug!(pid, temp, "cc_launch");
    let _ = &mut child;
    Ok(CcHandle { cc, child })
}

fn spawn_reader(
    cc: Cc,
    mut stdout: tokio::process::ChildStdout,
    coordinator: Arc<RefreshCoordinator>,
    notifications: mpsc::UnboundedSender<Notification>,
) {
    tokio::spawn(async move {
        let mut ring = Ring::new();
        let mut parser = Parser::new();
        loop {
            let mut sink = Sink::Ring(&mut ring);
            let outcome = match read_available(&mut stdout, Framing::CString, &mut sink).await {
                Ok(o) => o,
                Err(e) => {
                    warn!(pid = cc.pid, error = %e, "CC stdout read failed");
                    break;
                }
            };
            let events = match parser.drain(&mut ring) {
                Ok(events) => events,
                Err(e) => {
                    warn!(pid = cc.pid, error = %e, "control-mode parse error");
                    if outcome.hangup {
                        break;
                    }
                    continue;
                }
            };
            for event in events {
                match event {
                    Event::Reply(reply) => {
                        if cc.compensate.swap(false, Ordering::AcqRel) {
                            debug!(pid = cc.pid, "discarding compensate reply");
                            continue;
                        }
                        if let Some(tx) = cc.take_pending().await {
                            let _ = tx.send(reply);
                        }
                    }
                    Event::Notification(notif) => {
                        let flags = notif.refresh_flags();
                        if !flags.is_empty() {
                            coordinator.queue_refresh(flags);
                        }
                        let _ = notifications.send(notif);
                    }
                }
            }
            // Checked on the raw read outcome, not on `ring.is_empty()`:
            // `read_available` always appends a trailing separator byte in
            // `CString` framing, even on EOF, so the ring is never actually
            // empty right after a hangup.
            if outcome.hangup {
                break;
            }
        }
        cc.mark_dead();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launches_a_temp_session_cc_against_real_tmux_if_available() {
        if which_tmux().is_none() {
            eprintln!("skipping: tmux not on PATH");
            return;
        }
        let config = Config::new();
        let coordinator = Arc::new(RefreshCoordinator::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = cc_launch(&config, None, coordinator, tx).await;
        if let Ok(mut handle) = handle {
            assert!(handle.cc.temp);
            let _ = handle.child.kill().await;
        }
    }

    fn which_tmux() -> Option<()> {
        std::process::Command::new("tmux")
            .arg("-V")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|_| ())
    }
}
