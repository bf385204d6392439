//! Option queries (§4.8.2): `get_option`.

/// Mode bits for `get_option`: local vs. global, and which target a local
/// query applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionScope {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionTarget {
    Server,
    Session,
    Window,
}

/// Composes `show-options -v[gwst]? [target]? <name>` for the requested
/// mode. `-v` always requests value-only output; the second flag encodes
/// scope+target exactly as tmux expects:
/// - global session option: `-gv`
/// - global window option: `-gwv`
/// - local (per-target) session option: `-v -t <target>`
/// - local window option: `-wv -t <target>`
/// - server option: `-sv`
pub fn build_args(
    name: &str,
    target: Option<&str>,
    scope: OptionScope,
    kind: OptionTarget,
) -> Vec<String> {
    let mut flags = String::from("-v");
    match kind {
        OptionTarget::Server => flags.push('s'),
        OptionTarget::Window => flags.push('w'),
        OptionTarget::Session => {}
    }
    if scope == OptionScope::Global {
        flags.push('g');
    }

    let mut args = vec!["show-options".to_string(), flags];
    if let (OptionScope::Local, Some(t)) = (scope, target) {
        args.push("-t".to_string());
        args.push(t.to_string());
    }
    args.push(name.to_string());
    args
}

/// Strips a single trailing newline (and CR, if present) from raw command
/// output, per §4.8.2.
pub fn strip_trailing_newline(raw: &str) -> &str {
    let trimmed = raw.strip_suffix('\n').unwrap_or(raw);
    trimmed.strip_suffix('\r').unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_session_option() {
        let args = build_args("status", None, OptionScope::Global, OptionTarget::Session);
        assert_eq!(args, vec!["show-options", "-vg", "status"]);
    }

    #[test]
    fn local_window_option_with_target() {
        let args = build_args(
            "window-status-format",
            Some("@3"),
            OptionScope::Local,
            OptionTarget::Window,
        );
        assert_eq!(
            args,
            vec!["show-options", "-vw", "-t", "@3", "window-status-format"]
        );
    }

    #[test]
    fn strips_single_trailing_newline() {
        assert_eq!(strip_trailing_newline("top\n"), "top");
        assert_eq!(strip_trailing_newline("top"), "top");
    }
}
