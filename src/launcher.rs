//! Child launcher (§4.2): forks/execs tmux with optional stdio pipes.
//!
//! The spec's raw `fork`+`dup2`+`exec` is replaced by `tokio::process::Command`
//! with piped stdio, which is exactly the pattern the teacher's
//! `control_mode/connection.rs` uses to spawn `tmux -C`. `kill_on_drop(true)`
//! gives us the "closing the child's pipes on teardown" behavior the spec's
//! launcher gets from closing duplicated fds in the parent.

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::{Error, Result};

/// What stdio streams the caller wants wired up as pipes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WantPipes {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

/// A spawned tmux child plus whichever pipe ends were requested.
pub struct Launched {
    pub child: Child,
    pub pid: u32,
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
}

/// Combines `argv` (already including the command-assembler prefix) with
/// the requested pipes and spawns tmux.
///
/// Errors: *Invalid* for an empty argv, *IO* for spawn failures.
pub fn fork_tmux(argv: &[String], want: WantPipes) -> Result<Launched> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Invalid("argv must contain at least a binary".into()));
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.kill_on_drop(true);

    if want.stdin {
        cmd.stdin(std::process::Stdio::piped());
    } else {
        cmd.stdin(std::process::Stdio::null());
    }
    if want.stdout {
        cmd.stdout(std::process::Stdio::piped());
    } else {
        cmd.stdout(std::process::Stdio::null());
    }
    if want.stderr {
        cmd.stderr(std::process::Stdio::piped());
    } else {
        cmd.stderr(std::process::Stdio::null());
    }

    debug!(argv = ?argv, "fork_tmux");

    let mut child = cmd.spawn().map_err(Error::Io)?;
    let pid = child.id().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "child exited before pid could be read",
        ))
    })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();

    Ok(Launched {
        child,
        pid,
        stdin,
        stdout,
    })
}
