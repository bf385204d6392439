//! The control-client stack (§9 components 5, 6, 7): CC lifecycle, the
//! control-mode parser, and the request/response plexer.

pub mod cc;
pub mod layout;
pub mod parser;
pub mod plexer;

pub use cc::{cc_launch, Cc, CcHandle, CcInner};
pub use parser::{CommandReply, Event, Notification, Parser};
pub use plexer::{cc_exec, quote_command};
