//! Command assembler (§4.1): the fixed argv prefix shared by every tmux
//! invocation, plus the connect-time version gate.

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_WIDTH: u16 = 80;
pub const DEFAULT_HEIGHT: u16 = 24;
pub const MIN_DIM: u16 = 10;

fn default_bin_file() -> String {
    "tmux".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Default for Size {
    fn default() -> Self {
        Size {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Mutually exclusive socket selector: `-L name` or `-S path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Socket {
    Name(String),
    Path(String),
}

/// Validated connect-time configuration. Setters reject mutation while
/// `connected` is true (§4.1 Busy).
#[derive(Debug, Clone)]
pub struct Config {
    bin_file: String,
    socket: Option<Socket>,
    config_file: Option<String>,
    timeout_ms: u64,
    size: Size,
    connected: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bin_file: default_bin_file(),
            socket: None,
            config_file: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            size: Size::default(),
            connected: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn guard_not_connected(&self, field: &'static str) -> Result<()> {
        if self.connected {
            return Err(Error::Busy(field));
        }
        Ok(())
    }

    pub fn bin_file(&self) -> &str {
        &self.bin_file
    }

    pub fn set_bin_file(&mut self, path: impl Into<String>) -> Result<()> {
        self.guard_not_connected("bin_file")?;
        let path = path.into();
        if path.is_empty() {
            return Err(Error::Invalid("bin_file must not be empty".into()));
        }
        self.bin_file = path;
        Ok(())
    }

    pub fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    /// Setting `socket_name` clears any previously set `socket_path`, and
    /// vice versa — they're mutually exclusive.
    pub fn set_socket_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.guard_not_connected("socket_name")?;
        self.socket = Some(Socket::Name(name.into()));
        Ok(())
    }

    pub fn set_socket_path(&mut self, path: impl Into<String>) -> Result<()> {
        self.guard_not_connected("socket_path")?;
        self.socket = Some(Socket::Path(path.into()));
        Ok(())
    }

    pub fn config_file(&self) -> Option<&str> {
        self.config_file.as_deref()
    }

    pub fn set_config_file(&mut self, path: impl Into<String>) -> Result<()> {
        self.guard_not_connected("config")?;
        self.config_file = Some(path.into());
        Ok(())
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<()> {
        self.guard_not_connected("timeout")?;
        self.timeout_ms = timeout_ms;
        Ok(())
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Setting `size` while connected is allowed (§5: it triggers a
    /// size-update round across every CC) — callers of the façade drive
    /// that round; this setter just records the new value.
    pub fn set_size(&mut self, width: u16, height: u16) -> Result<()> {
        if width < MIN_DIM || height < MIN_DIM {
            return Err(Error::Invalid(format!(
                "size must be at least {MIN_DIM}x{MIN_DIM}"
            )));
        }
        self.size = Size { width, height };
        Ok(())
    }

    /// Builds the fixed argv prefix: `[bin] [-L name | -S path] [-f config]`.
    pub fn argv_prefix(&self) -> Vec<String> {
        let mut argv = vec![self.bin_file.clone()];
        match &self.socket {
            Some(Socket::Name(n)) => {
                argv.push("-L".into());
                argv.push(n.clone());
            }
            Some(Socket::Path(p)) => {
                argv.push("-S".into());
                argv.push(p.clone());
            }
            None => {}
        }
        if let Some(cfg) = &self.config_file {
            argv.push("-f".into());
            argv.push(cfg.clone());
        }
        argv
    }

    /// Composes the final argv for one invocation: prefix + caller args.
    pub fn argv(&self, args: &[String]) -> Vec<String> {
        let mut full = self.argv_prefix();
        full.extend(args.iter().cloned());
        full
    }
}

/// Parses `tmux -V` output (`<program> <version>`) and enforces the
/// minimum-version policy: newer than 2.4, or the literal string `master`.
///
/// Uses proper dotted-integer comparison rather than the `atof` comparison
/// the spec flags as a latent bug (`2.10` must compare greater than `2.4`).
pub fn check_version(version_output: &str) -> Result<()> {
    let trimmed = version_output.trim();
    let version_str = trimmed
        .split_whitespace()
        .last()
        .ok_or_else(|| Error::Invalid(format!("unparseable tmux -V output: {trimmed:?}")))?;

    if version_str == "master" {
        return Ok(());
    }

    // tmux sometimes suffixes versions with a letter, e.g. "3.3a".
    let numeric_part: String = version_str
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let parts: Vec<u32> = numeric_part
        .split('.')
        .map(|p| p.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| Error::Invalid(format!("unparseable tmux version: {version_str:?}")))?;

    if parts.is_empty() {
        return Err(Error::Invalid(format!(
            "unparseable tmux version: {version_str:?}"
        )));
    }

    let minimum = [2u32, 4];
    if compare_version(&parts, &minimum) == std::cmp::Ordering::Greater {
        Ok(())
    } else {
        Err(Error::VersionTooOld(version_str.to_string()))
    }
}

fn compare_version(a: &[u32], b: &[u32]) -> std::cmp::Ordering {
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}
