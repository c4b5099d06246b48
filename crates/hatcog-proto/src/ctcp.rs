//! CTCP (Client-to-Client Protocol) helpers.
//!
//! CTCP payloads ride inside `PRIVMSG`/`NOTICE` trailing parameters,
//! wrapped in the `\x01` delimiter.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use hatcog_proto::ctcp;
//!
//! assert_eq!(ctcp::action("dances"), "\x01ACTION dances\x01");
//! assert!(ctcp::is_ctcp("\x01VERSION\x01"));
//! ```

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// Keyword marking a `/me` action.
pub const ACTION: &str = "ACTION";

/// Keyword marking a client version query.
pub const VERSION: &str = "VERSION";

/// Whether a trailing parameter starts with the CTCP delimiter.
#[inline]
pub fn is_ctcp(text: &str) -> bool {
    text.starts_with(CTCP_DELIM)
}

/// Wrap `text` as a CTCP ACTION body.
pub fn action(text: &str) -> String {
    format!("{CTCP_DELIM}{ACTION} {text}{CTCP_DELIM}")
}

/// Build the CTCP VERSION reply body.
pub fn version_reply(version: &str) -> String {
    format!("{CTCP_DELIM}{VERSION} {version}{CTCP_DELIM}")
}

/// If `text` begins with the word `keyword`, return what follows it.
///
/// The keyword must be followed by a space or end the text, so
/// `ACTIONS` does not match `ACTION`.
pub(crate) fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}
