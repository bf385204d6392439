//! Reload procedures (§4.8, §9 component 11): diff observed tmux state
//! against the shadow model, emit closures for deltas, and recursively
//! schedule deeper reloads.

pub mod clients;
pub mod keys;
pub mod options;
pub mod panes;
pub mod sessions;
pub mod windows;

use crate::error::Result;
use crate::model::SessionId;
use crate::reload::options::{OptionScope, OptionTarget};

/// What a reload procedure needs from its host: running a tmux command and
/// reading its lines, querying options, and (for sessions_reload only)
/// driving CC lifecycle. Implemented by the façade; reload procedures stay
/// testable against a mock.
#[async_trait::async_trait]
pub trait Runtime {
    /// Runs a tmux command and returns stdout split into non-empty lines.
    /// A non-zero exit status is swallowed per §4.8 ("a transient
    /// 'no server' is not fatal") and yields an empty vec rather than an
    /// error.
    async fn list(&mut self, args: &[String]) -> Result<Vec<String>>;

    async fn get_option(
        &mut self,
        name: &str,
        target: Option<&str>,
        scope: OptionScope,
        kind: OptionTarget,
    ) -> Result<String>;

    /// Launches a CC for `session` (`None` = temp session), applying the
    /// §4.4 closing rule (killing any existing temp CC first) when needed.
    async fn launch_cc(&mut self, session: Option<SessionId>) -> Result<()>;
}

/// A single field parsed out of a `-F` formatted tmux list line: handles
/// the small family of "1-5 integers plus optional tail string(s)" shapes
/// the reload procedures need.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(' ').collect()
}
