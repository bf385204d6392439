//! Error taxonomy for the control-client runtime.
//!
//! Mirrors the classification in the design: every failure mode a caller
//! can observe collapses into one of these variants, each carrying enough
//! context to explain itself without a caller having to inspect `errno`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Nil/contradictory arguments, unparseable tmux output, or an
    /// unrecognized control-mode line.
    #[error("invalid: {0}")]
    Invalid(String),

    /// A config setter was called while connected.
    #[error("busy: cannot change {0} while connected")]
    Busy(&'static str),

    /// Allocation failure. Rust's allocator aborts rather than returning
    /// here in practice, but the variant exists so `Vec::try_reserve`-style
    /// call sites (ring buffer growth) have somewhere to report to.
    #[error("out of memory")]
    OutOfMemory,

    /// An `errno`-bearing failure from read/write/close/fork/exec/poll/waitpid.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `tmux -V` parsed but the version is at or below 2.4 and not `master`.
    #[error("tmux version too old: {0} (need newer than 2.4, or master)")]
    VersionTooOld(String),

    /// A bounded wait (`cc_exec`, one-shot `exec`) elapsed before completion.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
