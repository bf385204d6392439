//! Refresh coordinator and closure queue (§4.9, §9 components 10/12).
//!
//! The spec's two self-pipes (SIGCHLD and refresh) collapse here into one
//! `tokio::sync::Notify` per [`RefreshCoordinator`] — multiple
//! `queue_refresh` calls made before the loop next polls still collapse
//! into a single refresh pass, which is the property §9 calls load-bearing,
//! not the literal pipe mechanism.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

use crate::error::Result;
use crate::model::{ClientSnapshot, PaneSnapshot, SessionSnapshot, WindowSnapshot};

/// The four-bit refresh flag set (GLOSSARY "Refresh flags").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshFlags(u8);

impl RefreshFlags {
    pub const SESSIONS: RefreshFlags = RefreshFlags(1 << 0);
    pub const WINDOWS: RefreshFlags = RefreshFlags(1 << 1);
    pub const PANES: RefreshFlags = RefreshFlags(1 << 2);
    pub const CLIENTS: RefreshFlags = RefreshFlags(1 << 3);

    pub const fn empty() -> Self {
        RefreshFlags(0)
    }

    pub fn contains(self, other: RefreshFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RefreshFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: RefreshFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for RefreshFlags {
    type Output = RefreshFlags;
    fn bitor(self, rhs: RefreshFlags) -> RefreshFlags {
        RefreshFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for RefreshFlags {
    fn bitor_assign(&mut self, rhs: RefreshFlags) {
        self.0 |= rhs.0;
    }
}

/// A deferred event-callback invocation (GLOSSARY "Closure"). The payload
/// is an owned snapshot rather than a raw pointer-plus-free-after-use flag
/// union: Rust's ownership already gives us "freed once the closure is
/// consumed" for the `*Closed` variants, since the entity was already
/// removed from the model before its snapshot was taken.
#[derive(Debug, Clone)]
pub enum Closure {
    NewSession(SessionSnapshot),
    SessionClosed(SessionSnapshot),
    SessionWindowChanged(SessionSnapshot),
    NewWindow(WindowSnapshot),
    WindowClosed(WindowSnapshot),
    WindowPaneChanged(WindowSnapshot),
    NewPane(PaneSnapshot),
    PaneClosed(PaneSnapshot),
    PaneResized(PaneSnapshot),
    PaneModeChanged(PaneSnapshot),
    ClientSessionChanged(ClientSnapshot),
}

/// A growable list of pending closures, drained in insertion order at the
/// end of a successful refresh pass.
#[derive(Debug, Default)]
pub struct ClosureQueue {
    items: Vec<Closure>,
}

impl ClosureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, closure: Closure) {
        self.items.push(closure);
    }

    pub fn extend(&mut self, other: ClosureQueue) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Drains every queued closure in order. §8's "closure queue is empty
    /// at entry and exit of every refresh callback invocation" is enforced
    /// by always draining fully here rather than leaving a remainder.
    pub fn drain(&mut self) -> Vec<Closure> {
        std::mem::take(&mut self.items)
    }
}

/// Coalesces `queue_refresh` calls from any task (the CC reader task, the
/// supervisor) into a single pending bitset, and wakes exactly one waiter
/// per batch of calls.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    pending: AtomicU8,
    notify: Notify,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_refresh(&self, flags: RefreshFlags) {
        self.pending.fetch_or(flags.0, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Snapshots and zeroes the pending bitset.
    pub fn take_pending(&self) -> RefreshFlags {
        RefreshFlags(self.pending.swap(0, Ordering::SeqCst))
    }

    /// Re-queues bits that a failed pass did not get to process, without
    /// waking a new pass immediately (the next real event will).
    pub fn restore_pending(&self, flags: RefreshFlags) {
        self.pending.fetch_or(flags.0, Ordering::SeqCst);
    }
}

/// The four reload procedures, performed by whatever owns `exec` access
/// (the façade). `refresh.rs` only owns the *precedence* in which they run.
#[async_trait::async_trait]
pub trait ReloadOps {
    async fn sessions_reload(&mut self) -> Result<ClosureQueue>;
    async fn windows_reload(&mut self) -> Result<ClosureQueue>;
    async fn panes_reload(&mut self) -> Result<ClosureQueue>;
    async fn clients_reload(&mut self) -> Result<ClosureQueue>;
}

/// Runs one refresh pass in the §4.9 precedence order. On success, returns
/// the merged closures, fully drained to run. On failure, re-queues
/// whatever bits were not successfully covered (via `coordinator`) and
/// propagates the error; any closures accumulated before the failure are
/// dropped, releasing their payloads.
pub async fn run_pass(
    coordinator: &RefreshCoordinator,
    pending: RefreshFlags,
    ops: &mut impl ReloadOps,
) -> Result<ClosureQueue> {
    let mut closures = ClosureQueue::new();

    if pending.contains(RefreshFlags::SESSIONS) {
        match ops.sessions_reload().await {
            Ok(c) => {
                closures.extend(c);
                // Sessions reload recursively covers windows/panes/clients.
                return Ok(closures);
            }
            Err(e) => {
                coordinator.restore_pending(pending);
                return Err(e);
            }
        }
    }

    let mut remaining = pending;

    if pending.contains(RefreshFlags::WINDOWS) {
        match ops.windows_reload().await {
            Ok(c) => {
                closures.extend(c);
                remaining.remove(RefreshFlags::WINDOWS);
                remaining.remove(RefreshFlags::PANES);
            }
            Err(e) => {
                coordinator.restore_pending(remaining);
                return Err(e);
            }
        }
    } else if pending.contains(RefreshFlags::PANES) {
        match ops.panes_reload().await {
            Ok(c) => {
                closures.extend(c);
                remaining.remove(RefreshFlags::PANES);
            }
            Err(e) => {
                coordinator.restore_pending(remaining);
                return Err(e);
            }
        }
    }

    if remaining.contains(RefreshFlags::CLIENTS) {
        match ops.clients_reload().await {
            Ok(c) => {
                closures.extend(c);
                remaining.remove(RefreshFlags::CLIENTS);
            }
            Err(e) => {
                coordinator.restore_pending(remaining);
                return Err(e);
            }
        }
    }

    Ok(closures)
}
