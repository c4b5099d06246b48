//! One IRC protocol line and its JSON twin.
//!
//! Upstream text is parsed by [`Line::parse`]. Clients of the bouncer never
//! see IRC syntax; they receive each [`Line`] as a newline-terminated JSON
//! record produced by [`Line::to_json`].

use std::str::FromStr;

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::command::{Command, RPL_AWAY};
use crate::ctcp::{self, ACTION, CTCP_DELIM, VERSION};
use crate::error::ParseError;

/// A parsed IRC message.
///
/// Built once per inbound raw line and not modified afterwards, except for
/// [`Line::network`], which the link that read it stamps before handing it on.
///
/// `channel == user` marks a private (query) conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Line {
    /// The sanitised text the line was parsed from.
    pub raw: String,
    /// Local parse time, RFC 3339.
    pub received: String,
    /// Nick part of a `nick!user@host` prefix, empty for server lines.
    pub user: String,
    /// The rest of the prefix: `user@host`, or the server name.
    pub host: String,
    /// IRC verb or three-digit numeric, after CTCP rewriting.
    pub command: String,
    /// Middle parameters, in order.
    pub args: Vec<String>,
    /// Trailing parameter, CTCP markers removed.
    pub content: String,
    /// The trailing parameter started with the CTCP delimiter.
    #[serde(rename = "IsCTCP")]
    pub is_ctcp: bool,
    /// The trailing parameter started with the `ACTION` keyword.
    pub is_action: bool,
    /// Routing target: a `#channel`, or a nick for private conversations.
    pub channel: String,
    /// Address of the upstream link that produced the line.
    pub network: String,
}

/// Trim junk from a line of input.
///
/// Keeps only the text before the first `\n`, then strips whitespace, NUL
/// bytes and the CTCP delimiter from both ends.
pub fn sane(data: &str) -> &str {
    let first = match data.split_once('\n') {
        Some((first, _)) => first,
        None => data,
    };
    first.trim_matches(|c: char| c.is_whitespace() || c == CTCP_DELIM || c == '\0')
}

fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Line {
    /// Parse one line of IRC protocol text.
    ///
    /// # Errors
    ///
    /// [`ParseError::TooShort`] when fewer than two characters survive
    /// [`sane`]; [`ParseError::Malformed`] for a prefix without a command,
    /// a `user!host` prefix with more than one `!`, or an empty verb.
    pub fn parse(data: &str) -> Result<Self, ParseError> {
        let data = sane(data);
        if data.chars().nth(1).is_none() {
            return Err(ParseError::TooShort);
        }

        let mut user = String::new();
        let mut host = String::new();
        let mut rest = data;

        if let Some(prefixed) = data.strip_prefix(':') {
            let (prefix, remainder) = prefixed
                .split_once(' ')
                .ok_or(ParseError::Malformed("prefix without command"))?;

            if prefix.contains('!') {
                let mut parts = prefix.split('!');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(nick), Some(userhost), None) => {
                        user = nick.to_owned();
                        host = userhost.to_owned();
                    }
                    _ => return Err(ParseError::Malformed("prefix has more than one '!'")),
                }
            } else {
                host = prefix.to_owned();
            }
            rest = remainder;
        }

        let mut is_ctcp = false;
        let (middle, mut content) = match rest.split_once(" :") {
            Some((middle, trailing)) => {
                is_ctcp = ctcp::is_ctcp(trailing);
                (middle, sane(trailing).to_owned())
            }
            None => (rest, String::new()),
        };

        let mut args = middle.split(' ').map(str::to_owned);
        let mut command = args.next().unwrap_or_default();
        let args: Vec<String> = args.collect();
        if command.is_empty() {
            return Err(ParseError::Malformed("missing command"));
        }

        let kind = Command::parse(&command);
        let mut channel = args
            .iter()
            .find(|arg| arg.starts_with('#'))
            .cloned()
            .unwrap_or_default();

        if channel.is_empty() {
            match kind {
                // A query: the sender stands in for the channel.
                Command::Privmsg => channel = user.clone(),
                Command::Join => channel = content.clone(),
                // `301 me nick :away message` belongs with the query window for `nick`.
                Command::Numeric(RPL_AWAY) if args.len() >= 2 => {
                    channel = args[1].clone();
                    if user.is_empty() {
                        user = args[1].clone();
                    }
                }
                _ => {}
            }
        }

        let mut is_action = false;
        if let Some(text) = ctcp::strip_keyword(&content, ACTION) {
            content = text.to_owned();
            command = ACTION.to_owned();
            is_action = true;
        } else if kind == Command::Privmsg && ctcp::strip_keyword(&content, VERSION).is_some() {
            content.clear();
            command = VERSION.to_owned();
        }

        Ok(Self {
            raw: data.to_owned(),
            received: now_rfc3339(),
            user,
            host,
            command,
            args,
            content,
            is_ctcp,
            is_action,
            channel,
            network: String::new(),
        })
    }

    /// Synthetic `NICK` line telling a client which nick it speaks as.
    pub fn nick(nick: &str) -> Self {
        Self {
            received: now_rfc3339(),
            command: "NICK".to_owned(),
            content: nick.to_owned(),
            ..Self::default()
        }
    }

    /// The command, classified.
    pub fn kind(&self) -> Command {
        Command::parse(&self.command)
    }

    /// A chat line in a private conversation (`user == channel`).
    pub fn is_private(&self) -> bool {
        self.kind().is_message() && !self.user.is_empty() && self.user == self.channel
    }

    /// Serialize for the internal wire, newline-terminated.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut data = serde_json::to_vec(self)?;
        data.push(b'\n');
        Ok(data)
    }

    /// Deserialize one JSON record; a trailing newline is accepted.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

impl FromStr for Line {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
