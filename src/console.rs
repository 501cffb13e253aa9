//! # Console Commands (!)
//!
//! Lines typed into the terminal client are either chat messages or
//! bang commands that change the session.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: mode, tone, reset, history and help

use crate::conversation::{Conversation, Role};
use crate::modes::{Mode, Tone};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Chat(String),
    Mode(Option<String>),
    Tone(Option<String>),
    Reset,
    History,
    Help,
    Quit,
    Unknown(String),
}

/// All available console command names
pub const COMMANDS: &[&str] = &["mode", "tone", "reset", "history", "help", "quit"];

/// Parses one line of console input.
///
/// Lines not starting with `!` are chat messages; blank lines give `None`.
pub fn parse_console_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('!') else {
        return Some(ConsoleCommand::Chat(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().map(|s| s.to_string());

    let command = match name.as_str() {
        "mode" => ConsoleCommand::Mode(arg),
        "tone" => ConsoleCommand::Tone(arg),
        "reset" => ConsoleCommand::Reset,
        "history" => ConsoleCommand::History,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Unknown(name),
    };
    Some(command)
}

pub fn get_help_text() -> String {
    let mut help = String::from("Console commands\n\n");

    help.push_str("!mode <name>   switch mode (");
    help.push_str(&Mode::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", "));
    help.push_str(")\n");
    help.push_str("!tone <name>   switch tone (");
    help.push_str(&Tone::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "));
    help.push_str(")\n");
    help.push_str("!reset         start the conversation over\n");
    help.push_str("!history       show the conversation so far\n");
    help.push_str("!help          show this help message\n");
    help.push_str("!quit          leave\n\n");

    help.push_str("Modes\n");
    for mode in Mode::ALL {
        help.push_str(&format!("  {:<12} {}\n", mode.as_str(), mode.description()));
    }
    help.push('\n');
    help.push_str("Anything else is sent to the assistant.\n");

    help
}

/// Renders the transcript the way the console prints it.
pub fn format_history(conversation: &Conversation) -> String {
    let mut out = format!(
        "Session {} | mode: {} | tone: {}\n",
        conversation.session_id(),
        conversation.mode(),
        conversation.tone()
    );
    for message in conversation.messages() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        out.push_str(&format!("[{}] {}: {}\n", message.timestamp.format("%H:%M:%S"), speaker, message.text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;
    use crate::history::MemoryHistory;
    use std::sync::Arc;

    #[test]
    fn test_parse_chat_and_blank() {
        assert_eq!(parse_console_command("   "), None);
        assert_eq!(
            parse_console_command("  how do I pitch a brand? "),
            Some(ConsoleCommand::Chat("how do I pitch a brand?".to_string()))
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_console_command("!mode plagiarism"),
            Some(ConsoleCommand::Mode(Some("plagiarism".to_string())))
        );
        assert_eq!(parse_console_command("!TONE"), Some(ConsoleCommand::Tone(None)));
        assert_eq!(parse_console_command("!reset"), Some(ConsoleCommand::Reset));
        assert_eq!(parse_console_command("!history"), Some(ConsoleCommand::History));
        assert_eq!(parse_console_command("!exit"), Some(ConsoleCommand::Quit));
        assert_eq!(
            parse_console_command("!dance"),
            Some(ConsoleCommand::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = get_help_text();
        for cmd in COMMANDS {
            assert!(help.contains(&format!("!{}", cmd)));
        }
        assert!(help.contains("persuasive"));
    }

    #[tokio::test]
    async fn test_format_history() {
        let mut conversation = Conversation::new("c1", Arc::new(MemoryHistory::new()), 2000);
        conversation.append(Message::new(Role::User, "hi there")).await;

        let rendered = format_history(&conversation);
        assert!(rendered.starts_with("Session c1 | mode: general | tone: friendly"));
        assert!(rendered.contains("you: hi there"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
