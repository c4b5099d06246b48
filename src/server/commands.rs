//! Client input, classified.

/// What a line typed by a client asks the router to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand<'a> {
    /// `/pw <password>`: identify with NickServ.
    Pw(&'a str),
    /// `/me <text>`: CTCP action to the bound channel.
    Me(&'a str),
    /// `/nick <new>`
    Nick(&'a str),
    /// `/connect <host:port[:password]>`
    Connect(&'a str),
    /// `/quit [reason]`: leave every network and stop the daemon.
    Quit,
    /// Any other slash command, sent upstream verbatim.
    Raw(&'a str),
    /// Plain text for the bound channel.
    Chat(&'a str),
}

impl<'a> UserCommand<'a> {
    pub fn parse(content: &'a str) -> Self {
        let Some(command) = content.strip_prefix('/').filter(|c| !c.is_empty()) else {
            return Self::Chat(content);
        };
        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (command, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "quit" => Self::Quit,
            _ if arg.is_empty() => Self::Raw(content),
            "pw" => Self::Pw(arg),
            "me" => Self::Me(arg),
            "nick" => Self::Nick(arg),
            "connect" => Self::Connect(arg),
            _ => Self::Raw(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(UserCommand::parse("/pw hunter2"), UserCommand::Pw("hunter2"));
        assert_eq!(UserCommand::parse("/me waves"), UserCommand::Me("waves"));
        assert_eq!(UserCommand::parse("/ME waves hi"), UserCommand::Me("waves hi"));
        assert_eq!(UserCommand::parse("/nick graham_"), UserCommand::Nick("graham_"));
        assert_eq!(
            UserCommand::parse("/connect irc.oftc.net:6697"),
            UserCommand::Connect("irc.oftc.net:6697")
        );
        assert_eq!(UserCommand::parse("/quit"), UserCommand::Quit);
        assert_eq!(UserCommand::parse("/quit see ya"), UserCommand::Quit);
        assert_eq!(UserCommand::parse("/join #rust"), UserCommand::Raw("/join #rust"));
        assert_eq!(UserCommand::parse("hello"), UserCommand::Chat("hello"));
    }

    #[test]
    fn test_edge_cases() {
        // A lone slash is just text.
        assert_eq!(UserCommand::parse("/"), UserCommand::Chat("/"));
        // Known verbs without an argument pass through.
        assert_eq!(UserCommand::parse("/me"), UserCommand::Raw("/me"));
        assert_eq!(UserCommand::parse("/nick"), UserCommand::Raw("/nick"));
        // `/meh` is not `/me`.
        assert_eq!(UserCommand::parse("/meh ok"), UserCommand::Raw("/meh ok"));
    }
}
