//! Property-based tests for IRC line parsing.
//!
//! Generates well-formed `:nick!user@host COMMAND args :trailing` lines and
//! checks that parsing recovers each component, and that the JSON form used
//! on the client wire loses nothing the router depends on.

use hatcog_proto::{Command, Line};
use proptest::prelude::*;

fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

/// `user@host`, never containing `!` or spaces.
fn userhost_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("~?[a-z][a-z0-9]{0,9}@[a-z0-9]+(\\.[a-z0-9]+){0,3}")
        .expect("valid regex")
}

/// Uppercase verbs, excluding the ones the parser rewrites or interprets.
fn verb_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z]{4,8}")
        .expect("valid regex")
        .prop_filter("rewritten verbs", |v| v != "ACTION" && v != "VERSION")
}

fn middle_arg_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("#?[a-zA-Z0-9_\\-]{1,12}").expect("valid regex")
}

/// Trailing text that survives trimming: no CR/LF, starts and ends with a
/// visible lowercase character so no CTCP keyword can match.
fn trailing_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]([a-z0-9 ,.!?:]{0,60}[a-z0-9])?").expect("valid regex")
}

proptest! {
    #[test]
    fn parse_recovers_components(
        nick in nickname_strategy(),
        userhost in userhost_strategy(),
        verb in verb_strategy(),
        args in prop::collection::vec(middle_arg_strategy(), 1..4),
        trailing in trailing_strategy(),
    ) {
        let raw = format!(":{nick}!{userhost} {verb} {} :{trailing}", args.join(" "));
        let line = Line::parse(&raw).expect("well-formed line parses");

        prop_assert_eq!(&line.user, &nick);
        prop_assert_eq!(&line.host, &userhost);
        prop_assert_eq!(&line.command, &verb);
        prop_assert_eq!(&line.args, &args);
        prop_assert_eq!(&line.content, &trailing);
        prop_assert_eq!(&line.raw, &raw);
    }

    #[test]
    fn channel_is_first_hash_argument(
        nick in nickname_strategy(),
        args in prop::collection::vec(middle_arg_strategy(), 1..4),
        trailing in trailing_strategy(),
    ) {
        let raw = format!(":{nick}!~u@h NOTICE {} :{trailing}", args.join(" "));
        let line = Line::parse(&raw).expect("well-formed line parses");

        let expected = args.iter().find(|a| a.starts_with('#')).cloned().unwrap_or_default();
        prop_assert_eq!(line.channel, expected);
    }

    #[test]
    fn privmsg_to_nick_is_private(
        nick in nickname_strategy(),
        me in nickname_strategy(),
        trailing in trailing_strategy(),
    ) {
        let raw = format!(":{nick}!~u@h PRIVMSG {me} :{trailing}");
        let line = Line::parse(&raw).expect("well-formed line parses");

        prop_assert_eq!(line.kind(), Command::Privmsg);
        prop_assert_eq!(&line.channel, &line.user);
        prop_assert!(line.is_private());
    }

    #[test]
    fn json_preserves_routing_fields(
        nick in nickname_strategy(),
        userhost in userhost_strategy(),
        args in prop::collection::vec(middle_arg_strategy(), 1..4),
        trailing in trailing_strategy(),
    ) {
        let raw = format!(":{nick}!{userhost} PRIVMSG {} :{trailing}", args.join(" "));
        let mut line = Line::parse(&raw).expect("well-formed line parses");
        line.network = "irc.example.org:6697".to_string();

        let json = line.to_json().expect("serializes");
        let back = Line::from_json(&json).expect("deserializes");

        prop_assert_eq!(back, line);
    }

    #[test]
    fn parse_never_panics(input in "\\PC{0,200}") {
        let _ = Line::parse(&input);
    }
}
