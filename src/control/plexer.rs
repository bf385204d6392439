//! Request/response plexer (§4.6, §9 component 7): `cc_exec`.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::control::cc::Cc;
use crate::control::parser::CommandReply;
use crate::error::{Error, Result};

/// Serializes `args` as a single line of double-quoted tokens, escaping
/// `"` → `\"` and newline → `\n` within each token (§8 scenario 4).
pub fn quote_command(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("\"{}\"", escape_token(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_token(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Sends `args` on `cc` and awaits the matching reply envelope, up to
/// `timeout` (`Duration::ZERO` = no timeout). The CC's own serialization
/// lock (entered here) models the single-threaded event loop's guarantee
/// that only one `cc_exec` is ever in flight on a given CC at a time.
pub async fn cc_exec(cc: &Cc, args: &[String], timeout: Duration) -> Result<CommandReply> {
    let line = quote_command(args);
    let (tx, rx) = oneshot::channel();
    let prev = cc.install_pending(tx).await;

    let write_result = cc.write_line(&line).await;
    if let Err(e) = write_result {
        cc.restore_pending(prev).await;
        return Err(e);
    }

    let outcome = if timeout.is_zero() {
        rx.await
            .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "CC hung up")))
    } else {
        match tokio::time::timeout(timeout, rx).await {
            Ok(inner) => inner.map_err(|_| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "CC hung up"))
            }),
            Err(_elapsed) => Err(Error::Timeout(timeout)),
        }
    };

    cc.restore_pending(prev).await;
    outcome
}
