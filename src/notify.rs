//! Desktop side effects: notifications, beeps, private chat windows.
//!
//! Every command runs detached. The router never waits for one, and a
//! failure only shows up in the log.

use tokio::process::Command;
use tracing::{debug, warn};

use hatcog_proto::Line;

use crate::config::CommandsConfig;

/// Placeholder in the private chat command.
const NICK_PLACEHOLDER: &str = "{nick}";

/// Runs the external commands from `[commands]`.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    notify: Option<Vec<String>>,
    beep: Option<Vec<String>>,
    private_chat: Option<Vec<String>>,
}

fn argv(template: &Option<String>) -> Option<Vec<String>> {
    let parts: Vec<String> = template
        .as_deref()?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    (!parts.is_empty()).then_some(parts)
}

/// Notification title: the sender, plus the channel unless it is a
/// private conversation.
pub fn title(line: &Line) -> String {
    if line.channel == line.user || line.channel.is_empty() {
        line.user.clone()
    } else {
        format!("{} {}", line.user, line.channel)
    }
}

/// Nicks are passed to a shell-spawned program, so only accept the
/// characters IRC allows in them.
pub fn is_valid_nick(nick: &str) -> bool {
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let special = |c: char| "[]\\`_^{|}".contains(c);
    (first.is_ascii_alphabetic() || special(first))
        && chars.all(|c| c.is_ascii_alphanumeric() || special(c) || c == '-')
        && nick.len() <= 32
}

impl Notifier {
    pub fn new(config: &CommandsConfig) -> Self {
        Self {
            notify: argv(&config.notify),
            beep: argv(&config.beep),
            private_chat: argv(&config.private_chat),
        }
    }

    /// Arguments for a notification about `line`.
    pub fn notify_argv(&self, line: &Line) -> Option<Vec<String>> {
        let mut argv = self.notify.clone()?;
        argv.push(title(line));
        argv.push(line.content.clone());
        Some(argv)
    }

    /// Arguments that open a private chat with `nick`.
    pub fn private_chat_argv(&self, nick: &str) -> Option<Vec<String>> {
        if !is_valid_nick(nick) {
            return None;
        }
        let template = self.private_chat.as_ref()?;
        let mut argv: Vec<String> = template
            .iter()
            .map(|part| part.replace(NICK_PLACEHOLDER, nick))
            .collect();
        if !template.iter().any(|part| part.contains(NICK_PLACEHOLDER)) {
            argv.push(nick.to_string());
        }
        Some(argv)
    }

    pub fn notify(&self, line: &Line) {
        if let Some(argv) = self.notify_argv(line) {
            spawn_detached(argv);
        }
    }

    pub fn beep(&self) {
        if let Some(argv) = self.beep.clone() {
            spawn_detached(argv);
        }
    }

    /// Spawn the private chat command. Returns false if it is not
    /// configured or `nick` is not a valid nick.
    pub fn open_private(&self, nick: &str) -> bool {
        match self.private_chat_argv(nick) {
            Some(argv) => {
                spawn_detached(argv);
                true
            }
            None => false,
        }
    }
}

/// Start `argv` and reap it in the background.
fn spawn_detached(argv: Vec<String>) {
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(false);

    match command.spawn() {
        Ok(mut child) => {
            let program = program.clone();
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if status.success() => debug!(%program, "Command finished"),
                    Ok(status) => warn!(%program, %status, "Command failed"),
                    Err(e) => warn!(%program, error = %e, "Failed to wait for command"),
                }
            });
        }
        Err(e) => warn!(%program, error = %e, "Failed to run command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> Notifier {
        Notifier::new(&CommandsConfig {
            notify: Some("notify-send -t 3000".into()),
            beep: Some("aplay -q beep.wav".into()),
            private_chat: Some("tmux split-window hjoin --private={nick}".into()),
        })
    }

    #[test]
    fn test_title() {
        let line = Line::parse(":bob!~bob@example.org PRIVMSG #rust :graham: hi").unwrap();
        assert_eq!(title(&line), "bob #rust");

        let line = Line::parse(":bob!~bob@example.org PRIVMSG graham :hi").unwrap();
        assert_eq!(title(&line), "bob");
    }

    #[test]
    fn test_notify_argv() {
        let line = Line::parse(":bob!~bob@example.org PRIVMSG #rust :graham: hi").unwrap();
        assert_eq!(
            notifier().notify_argv(&line).unwrap(),
            vec!["notify-send", "-t", "3000", "bob #rust", "graham: hi"]
        );
        assert!(Notifier::default().notify_argv(&line).is_none());
    }

    #[test]
    fn test_private_chat_argv() {
        assert_eq!(
            notifier().private_chat_argv("bob").unwrap(),
            vec!["tmux", "split-window", "hjoin", "--private=bob"]
        );

        let appended = Notifier::new(&CommandsConfig {
            private_chat: Some("open-window".into()),
            ..Default::default()
        });
        assert_eq!(
            appended.private_chat_argv("bob").unwrap(),
            vec!["open-window", "bob"]
        );
    }

    #[test]
    fn test_private_chat_rejects_bad_nicks() {
        let n = notifier();
        assert!(n.private_chat_argv("bob;rm -rf ~").is_none());
        assert!(n.private_chat_argv("$(id)").is_none());
        assert!(n.private_chat_argv("").is_none());
        assert!(n.private_chat_argv("[away]bob_|2").is_some());
    }

    #[test]
    fn test_blank_commands_are_ignored() {
        let n = Notifier::new(&CommandsConfig {
            notify: Some("   ".into()),
            ..Default::default()
        });
        assert!(n.notify_argv(&Line::nick("graham")).is_none());
        assert!(!n.open_private("bob"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program_does_not_panic() {
        spawn_detached(vec!["/nonexistent/hatcog-notify".into()]);
        spawn_detached(Vec::new());
    }
}
