//! # hatcog-proto
//!
//! IRC line handling for the hatcog bouncer.
//!
//! Two wire formats meet here:
//!
//! - the upstream IRC protocol (`[:prefix] COMMAND arg1 arg2 ... [:trailing]`),
//!   parsed into a [`Line`] by [`Line::parse`];
//! - the internal client protocol, where every [`Line`] travels as one
//!   newline-terminated JSON record ([`Line::to_json`] / [`Line::from_json`]).
//!
//! ## Parsing a line
//!
//! ```rust
//! use hatcog_proto::Line;
//!
//! let line = Line::parse(":rnowak!~rnowak@q.ovron.com PRIVMSG #linode :totally").unwrap();
//! assert_eq!(line.user, "rnowak");
//! assert_eq!(line.channel, "#linode");
//! assert_eq!(line.content, "totally");
//! ```
//!
//! ## Command vocabulary
//!
//! [`Line::command`] stays a string on the wire so that unrecognised verbs pass
//! through untouched. Routing code matches on [`Line::kind`], a closed
//! [`Command`] enum with an explicit [`Command::Unrecognized`] case.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod ctcp;
pub mod error;
pub mod line;

#[cfg(feature = "tokio")]
pub mod codec;

pub use self::command::{Command, RPL_AWAY, RPL_NAMREPLY, RPL_WELCOME};
pub use self::error::{ParseError, ProtocolError};
pub use self::line::{sane, Line};

#[cfg(feature = "tokio")]
pub use self::codec::{to_unicode, LineCodec, MAX_LINE_LEN};
