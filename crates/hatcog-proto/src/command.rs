//! The IRC verbs the bouncer interprets.
//!
//! Only the handful of commands that influence routing get a variant of
//! their own. Numerics keep their code, and every other verb is carried as
//! [`Command::Unrecognized`] so it can be passed through verbatim.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol

use std::fmt;

/// `001`, first reply after successful registration.
pub const RPL_WELCOME: u16 = 1;
/// `301`, the target of a query is marked away.
pub const RPL_AWAY: u16 = 301;
/// `353`, channel member list.
pub const RPL_NAMREPLY: u16 = 353;

/// Classified IRC command of a [`crate::Line`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// `PRIVMSG target :text`
    Privmsg,
    /// `NOTICE target :text`
    Notice,
    /// `JOIN channel`
    Join,
    /// `PART channel [:reason]`
    Part,
    /// `NICK :newnick`
    Nick,
    /// `PING :token`
    Ping,
    /// `PONG :token`
    Pong,
    /// `QUIT [:reason]`
    Quit,
    /// CTCP ACTION, rewritten from a `PRIVMSG` whose text began with `ACTION`.
    Action,
    /// CTCP VERSION query, rewritten from a `PRIVMSG`.
    Version,
    /// Three-digit numeric reply.
    Numeric(u16),
    /// Any other verb, kept exactly as received.
    Unrecognized(String),
}

impl Command {
    /// Classify a command verb.
    pub fn parse(verb: &str) -> Self {
        if verb.len() == 3 && verb.bytes().all(|b| b.is_ascii_digit()) {
            // Three ASCII digits always fit in a u16.
            if let Ok(code) = verb.parse() {
                return Self::Numeric(code);
            }
        }
        match verb.to_ascii_uppercase().as_str() {
            "PRIVMSG" => Self::Privmsg,
            "NOTICE" => Self::Notice,
            "JOIN" => Self::Join,
            "PART" => Self::Part,
            "NICK" => Self::Nick,
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            "QUIT" => Self::Quit,
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            _ => Self::Unrecognized(verb.to_owned()),
        }
    }

    /// Canonical wire form of the verb.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        use std::borrow::Cow;
        match self {
            Self::Privmsg => Cow::Borrowed("PRIVMSG"),
            Self::Notice => Cow::Borrowed("NOTICE"),
            Self::Join => Cow::Borrowed("JOIN"),
            Self::Part => Cow::Borrowed("PART"),
            Self::Nick => Cow::Borrowed("NICK"),
            Self::Ping => Cow::Borrowed("PING"),
            Self::Pong => Cow::Borrowed("PONG"),
            Self::Quit => Cow::Borrowed("QUIT"),
            Self::Action => Cow::Borrowed("ACTION"),
            Self::Version => Cow::Borrowed("VERSION"),
            Self::Numeric(code) => Cow::Owned(format!("{code:03}")),
            Self::Unrecognized(verb) => Cow::Borrowed(verb),
        }
    }

    /// Chat text, as opposed to protocol chatter.
    #[inline]
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Privmsg | Self::Action)
    }

    /// Replies whose contents are worth showing in the daemon log.
    pub fn is_info(&self) -> bool {
        matches!(self, Self::Notice | Self::Numeric(1..=4 | 372))
    }

    /// Lines that only make sense inside a channel window, never broadcast.
    #[inline]
    pub fn is_channel_required(&self) -> bool {
        matches!(self, Self::Numeric(RPL_NAMREPLY))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}
