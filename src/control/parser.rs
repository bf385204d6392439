//! Control-mode parser (§4.5): turns already-desanitized ring bytes into
//! command replies and server-event notifications, and tells the caller
//! which refresh bits those notifications raise.
//!
//! Grounded in the teacher's `control_mode/parser.rs`, whose `ControlModeEvent`
//! enum and `%begin`/`%end`/`%error` dispatch this generalizes to the full
//! guard-matching rule in §4.5 (the teacher's parser does not implement the
//! "mismatched middle `%begin`" skip-mode behavior; this one does).

use crate::error::{Error, Result};
use crate::refresh::RefreshFlags;
use crate::ring::Ring;

/// A parsed server-event notification line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ClientSessionChanged,
    LayoutChange { window_id: String },
    PaneModeChanged { pane_id: String },
    WindowPaneChanged { window_id: String },
    SessionsChanged,
    SessionWindowChanged { session_id: String },
    WindowAdd { window_id: String },
    WindowClose { window_id: String },
    UnlinkedWindowAdd { window_id: String },
    UnlinkedWindowClose { window_id: String },
    Output,
    SessionChanged,
    SessionRenamed,
    UnlinkedWindowRenamed,
    WindowRenamed,
    Exit,
    StrayEnd,
    /// An unrecognized `%...` line; consumed to allow forward progress.
    Unrecognized(String),
}

impl Notification {
    /// The refresh bits this notification raises, per the §4.5 table.
    pub fn refresh_flags(&self) -> RefreshFlags {
        use Notification::*;
        match self {
            ClientSessionChanged => RefreshFlags::CLIENTS,
            LayoutChange { .. } | PaneModeChanged { .. } | WindowPaneChanged { .. } => {
                RefreshFlags::PANES
            }
            SessionsChanged => RefreshFlags::SESSIONS,
            SessionWindowChanged { .. }
            | WindowAdd { .. }
            | WindowClose { .. }
            | UnlinkedWindowAdd { .. }
            | UnlinkedWindowClose { .. } => RefreshFlags::WINDOWS,
            Output | SessionChanged | SessionRenamed | UnlinkedWindowRenamed | WindowRenamed
            | Exit | StrayEnd | Unrecognized(_) => RefreshFlags::empty(),
        }
    }
}

/// A command reply envelope (the payload between `%begin` and its matching
/// `%end`/`%error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub timestamp: i64,
    pub command_num: i64,
    pub payload: Vec<u8>,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Notification(Notification),
    Reply(CommandReply),
}

struct EnvelopeState {
    timestamp: i64,
    command_num: i64,
    flags: i64,
    payload: Vec<u8>,
}

/// Stateful line-oriented parser. Feed it ring bytes; it returns every
/// fully-parsed event and leaves a trailing partial line in the ring for
/// the next call.
#[derive(Default)]
pub struct Parser {
    envelope: Option<EnvelopeState>,
}

impl Parser {
    pub fn new() -> Self {
        Parser { envelope: None }
    }

    /// True while accumulating an envelope's payload (used by tests and by
    /// the driver to decide whether a hangup mid-envelope should discard
    /// the partial payload).
    pub fn in_envelope(&self) -> bool {
        self.envelope.is_some()
    }

    /// Pulls and removes the next complete `\n`-terminated line from the
    /// ring, if one is available. Leaves a trailing partial line in place.
    ///
    /// Skips leading `\0` bytes first: `read_available`'s `CString` framing
    /// appends one as an end-of-batch separator, but this parser is
    /// `\n`-delimited, so the separator carries no meaning here and would
    /// otherwise be mistaken for the start of the next line.
    fn next_line(ring: &mut Ring) -> Option<Vec<u8>> {
        loop {
            let data = ring.peek_contiguous();
            if data.first() == Some(&0) {
                ring.pop(1);
                continue;
            }
            let nl = data.iter().position(|&b| b == b'\n')?;
            ring.pop(nl + 1);
            let mut line = data[..nl].to_vec();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(line);
        }
    }

    /// Drains every complete line currently in `ring`, producing events.
    pub fn drain(&mut self, ring: &mut Ring) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        while let Some(line) = Self::next_line(ring) {
            if let Some(event) = self.process_line(&line)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &[u8]) -> Result<Option<Event>> {
        let text = String::from_utf8_lossy(line);

        if let Some(env) = self.envelope.as_mut() {
            if let Some(guard) = parse_guard(&text, "%end").or_else(|| parse_guard(&text, "%error")) {
                let is_error = text.starts_with("%error");
                if guard == (env.timestamp, env.command_num, env.flags) {
                    let env = self.envelope.take().unwrap();
                    return Ok(Some(Event::Reply(CommandReply {
                        timestamp: env.timestamp,
                        command_num: env.command_num,
                        payload: env.payload,
                        is_error,
                    })));
                }
                // Guard mismatch: treat this terminator line as ordinary
                // payload and keep scanning for the real one (§4.5 "skip
                // mode" for a mismatched middle begin/end).
            }
            env.payload.extend_from_slice(line);
            env.payload.push(b'\n');
            return Ok(None);
        }

        if let Some(text_tail) = text.strip_prefix("%begin ") {
            let mut parts = text_tail.split_whitespace();
            let timestamp = parse_i64(parts.next())?;
            let command_num = parse_i64(parts.next())?;
            let flags = parse_i64(parts.next())?;
            self.envelope = Some(EnvelopeState {
                timestamp,
                command_num,
                flags,
                payload: Vec::new(),
            });
            return Ok(None);
        }

        if text.starts_with("%end") || text.starts_with("%error") {
            // Stray terminator with no open envelope: consumed, no event.
            return Ok(Some(Event::Notification(Notification::StrayEnd)));
        }

        if let Some(rest) = text.strip_prefix('%') {
            return Ok(Some(Event::Notification(parse_notification(rest))));
        }

        Err(Error::Invalid(format!(
            "control-mode parser: unrecognized leading byte in line {text:?}"
        )))
    }
}

fn parse_guard(text: &str, verb: &str) -> Option<(i64, i64, i64)> {
    let rest = text.strip_prefix(verb)?.trim_start();
    let mut parts = rest.split_whitespace();
    let t = parts.next()?.parse().ok()?;
    let n = parts.next()?.parse().ok()?;
    let f = parts.next()?.parse().ok()?;
    Some((t, n, f))
}

fn parse_i64(token: Option<&str>) -> Result<i64> {
    token
        .ok_or_else(|| Error::Invalid("control-mode parser: missing envelope guard field".into()))?
        .parse()
        .map_err(|_| Error::Invalid("control-mode parser: non-integer envelope guard field".into()))
}

fn first_id(rest: &str) -> String {
    rest.split_whitespace().nth(1).unwrap_or("").to_string()
}

fn parse_notification(rest: &str) -> Notification {
    let verb = rest.split_whitespace().next().unwrap_or("");
    match verb {
        "client-session-changed" => Notification::ClientSessionChanged,
        "layout-change" => Notification::LayoutChange {
            window_id: first_id(rest),
        },
        "pane-mode-changed" => Notification::PaneModeChanged {
            pane_id: first_id(rest),
        },
        "window-pane-changed" => Notification::WindowPaneChanged {
            window_id: first_id(rest),
        },
        "sessions-changed" => Notification::SessionsChanged,
        "session-window-changed" => Notification::SessionWindowChanged {
            session_id: first_id(rest),
        },
        "window-add" => Notification::WindowAdd {
            window_id: first_id(rest),
        },
        "window-close" => Notification::WindowClose {
            window_id: first_id(rest),
        },
        "unlinked-window-add" => Notification::UnlinkedWindowAdd {
            window_id: first_id(rest),
        },
        "unlinked-window-close" => Notification::UnlinkedWindowClose {
            window_id: first_id(rest),
        },
        "output" => Notification::Output,
        "session-changed" => Notification::SessionChanged,
        "session-renamed" => Notification::SessionRenamed,
        "unlinked-window-renamed" => Notification::UnlinkedWindowRenamed,
        "window-renamed" => Notification::WindowRenamed,
        "exit" => Notification::Exit,
        other => Notification::Unrecognized(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut Parser, text: &str) -> Vec<Event> {
        let mut ring = Ring::new();
        ring.push(text.as_bytes());
        parser.drain(&mut ring).unwrap()
    }

    #[test]
    fn parses_simple_reply_envelope() {
        let mut parser = Parser::new();
        let events = feed(
            &mut parser,
            "%begin 1 2 0\nhello\n%end 1 2 0\n",
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Reply(r) => {
                assert_eq!(r.payload, b"hello\n");
                assert!(!r.is_error);
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn error_envelope_sets_is_error() {
        let mut parser = Parser::new();
        let events = feed(&mut parser, "%begin 1 2 0\nboom\n%error 1 2 0\n");
        match &events[0] {
            Event::Reply(r) => assert!(r.is_error),
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn mismatched_guard_is_treated_as_payload() {
        let mut parser = Parser::new();
        let events = feed(
            &mut parser,
            "%begin 1 2 0\nfirst\n%end 9 9 9\nsecond\n%end 1 2 0\n",
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Reply(r) => {
                assert_eq!(r.payload, b"first\n%end 9 9 9\nsecond\n");
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn nested_begin_inside_envelope_is_payload() {
        let mut parser = Parser::new();
        let events = feed(
            &mut parser,
            "%begin 1 2 0\n%begin 3 4 0\nstuff\n%end 1 2 0\n",
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Reply(r) => {
                assert_eq!(r.payload, b"%begin 3 4 0\nstuff\n");
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn notification_sets_expected_refresh_flag() {
        let mut parser = Parser::new();
        let events = feed(&mut parser, "%sessions-changed\n");
        match &events[0] {
            Event::Notification(n) => {
                assert_eq!(*n, Notification::SessionsChanged);
                assert_eq!(n.refresh_flags(), RefreshFlags::SESSIONS);
            }
            _ => panic!("expected notification"),
        }
    }

    #[test]
    fn output_and_session_changed_raise_no_flags() {
        let mut parser = Parser::new();
        for line in ["%output %1 aGVsbG8=\n", "%session-changed $0 foo\n"] {
            let events = feed(&mut parser, line);
            match &events[0] {
                Event::Notification(n) => assert_eq!(n.refresh_flags(), RefreshFlags::empty()),
                _ => panic!("expected notification"),
            }
        }
    }

    #[test]
    fn unrecognized_notification_is_consumed_without_error() {
        let mut parser = Parser::new();
        let events = feed(&mut parser, "%something-new-from-the-future arg\n");
        assert_eq!(
            events[0],
            Event::Notification(Notification::Unrecognized("something-new-from-the-future".into()))
        );
    }

    #[test]
    fn unrecognized_leading_byte_is_an_error() {
        let mut parser = Parser::new();
        let mut ring = Ring::new();
        ring.push(b"garbage\n");
        assert!(parser.drain(&mut ring).is_err());
    }

    #[test]
    fn partial_line_is_left_for_next_call() {
        let mut parser = Parser::new();
        let mut ring = Ring::new();
        ring.push(b"%sessions-cha");
        assert!(parser.drain(&mut ring).unwrap().is_empty());
        ring.push(b"nged\n");
        let events = parser.drain(&mut ring).unwrap();
        assert_eq!(events[0], Event::Notification(Notification::SessionsChanged));
    }

    #[test]
    fn nul_batch_separator_between_notifications_is_skipped() {
        let mut parser = Parser::new();
        let mut ring = Ring::new();
        ring.push(b"%sessions-changed\n\0%layout-change @1 chk,80x24,0,0,0\n\0");
        let events = parser.drain(&mut ring).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::Notification(Notification::SessionsChanged));
        assert!(matches!(events[1], Event::Notification(Notification::LayoutChange { .. })));
    }

    #[test]
    fn trailing_nul_with_no_more_data_leaves_parser_waiting() {
        let mut parser = Parser::new();
        let mut ring = Ring::new();
        ring.push(b"\0");
        assert!(parser.drain(&mut ring).unwrap().is_empty());
        assert!(ring.is_empty());
    }
}
