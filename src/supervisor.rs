//! Process supervisor (§4.2): reaps finished CC children and provides the
//! bounded-wait helper used by one-shot `exec` and `cc_exec`.
//!
//! The spec's self-pipe-triggered `sigc` handler becomes a
//! `tokio::signal::unix::SignalKind::child()` stream: the kernel only
//! delivers one `SIGCHLD` stream per process, so — same as the spec's
//! process-global self-pipe — only one `Supervisor` (hence one core
//! instance) may usefully exist per process. See DESIGN.md.

use std::collections::HashMap;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Emitted once per reaped child.
#[derive(Debug, Clone, Copy)]
pub struct Reaped {
    pub pid: u32,
}

/// Reaps live CC children as `SIGCHLD` arrives. Which pid mattered how much
/// (e.g. "was this the last non-temp CC") is the façade's business, since it
/// alone knows the current CC map; this type only answers "which pids just
/// exited".
pub struct Supervisor {
    signal: SignalStream,
    reaped_tx: mpsc::UnboundedSender<Reaped>,
    reaped_rx: mpsc::UnboundedReceiver<Reaped>,
}

impl Supervisor {
    pub fn new() -> Result<Self> {
        let signal = signal(SignalKind::child()).map_err(Error::Io)?;
        let (reaped_tx, reaped_rx) = mpsc::unbounded_channel();
        Ok(Supervisor {
            signal,
            reaped_tx,
            reaped_rx,
        })
    }

    /// Awaits the next `SIGCHLD`. Callers loop this inside their event
    /// select and call [`Supervisor::reap_all`] in response.
    pub async fn wait_for_signal(&mut self) {
        self.signal.recv().await;
    }

    /// Drains the self-pipe equivalent (the signal stream has already
    /// coalesced repeats) and reaps every child whose process has actually
    /// exited, via non-blocking `try_wait`.
    ///
    /// `children` maps pid to the owning `Child` handle so `try_wait` can be
    /// invoked without racing tokio's own internal reaper.
    pub fn reap_all(&mut self, children: &mut HashMap<u32, Child>) -> Vec<Reaped> {
        let mut reaped = Vec::new();
        let pids: Vec<u32> = children.keys().copied().collect();
        for pid in pids {
            let Some(child) = children.get_mut(&pid) else {
                continue;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid, ?status, "reaped CC child");
                    children.remove(&pid);
                    reaped.push(Reaped { pid });
                }
                Ok(None) => {} // still running
                Err(e) => {
                    warn!(pid, error = %e, "try_wait failed");
                }
            }
        }
        reaped
    }

    /// Non-blocking drain of any reap events queued by external producers
    /// (kept for symmetry with the spec's self-pipe drain step).
    pub fn try_recv_reaped(&mut self) -> Option<Reaped> {
        self.reaped_rx.try_recv().ok()
    }

    pub fn reaped_sender(&self) -> mpsc::UnboundedSender<Reaped> {
        self.reaped_tx.clone()
    }
}

/// Waits for `child` to exit, up to `timeout`. `timeout == Duration::ZERO`
/// means "no timeout" (per §5: `timeout=0` disables the bound). On timeout,
/// SIGKILLs the child and blocks (interrupt-safe) until it's reaped.
pub async fn waitpid_bounded(child: &mut Child, timeout: Duration) -> Result<std::process::ExitStatus> {
    let wait_fut = child.wait();

    if timeout.is_zero() {
        return wait_fut.await.map_err(Error::Io);
    }

    match tokio::time::timeout(timeout, wait_fut).await {
        Ok(result) => result.map_err(Error::Io),
        Err(_elapsed) => {
            if let Some(pid) = child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            // Block-wait for the now-killed child; `Child::wait` retries
            // internally on EINTR.
            child.wait().await.map_err(Error::Io)
        }
    }
}
