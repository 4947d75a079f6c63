//! Slash command parsing for the chatsync REPL.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions and settings without sending a message.

use crate::types::{SessionId, SessionKind};

/// A parsed chat command.
///
/// These commands act on the session list or the settings and are never sent as messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// List sessions, newest activity first.
    List,

    /// Reload the session list from the server.
    Refresh,

    /// Create a session and make it active.
    New {
        /// What backs the session.
        kind: SessionKind,
        /// Explicit title; the default title is used if absent.
        title: Option<String>,
    },

    /// Make a session active.
    Select(SessionId),

    /// Rename the active session.
    Rename(String),

    /// Delete a session; the active one if none is given.
    Delete(Option<SessionId>),

    /// Print the messages of the active session.
    History,

    /// Attach a file to the next message.
    Attach(String),

    /// Drop all pending attachments.
    Detach,

    /// Change the model.
    Model(String),

    /// Toggle streamed replies.
    Stream(bool),

    /// Toggle web search.
    WebSearch(bool),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chatsync::commands::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/select 12").is_some());
/// assert!(parse_command("What is a monad?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "list" | "ls" | "sessions" => ChatCommand::List,
        "refresh" => ChatCommand::Refresh,
        "new" => parse_new_command(argument),
        "select" | "open" => match argument.map(str::parse::<SessionId>) {
            Some(Ok(id)) => ChatCommand::Select(id),
            Some(Err(_)) => ChatCommand::Invalid("/select expects a session id".to_string()),
            None => ChatCommand::Invalid("/select requires a session id".to_string()),
        },
        "rename" | "title" => match argument {
            Some(title) => ChatCommand::Rename(title.to_string()),
            None => ChatCommand::Invalid("/rename requires a title".to_string()),
        },
        "delete" | "rm" => match argument.map(str::parse::<SessionId>) {
            Some(Ok(id)) => ChatCommand::Delete(Some(id)),
            Some(Err(_)) => ChatCommand::Invalid("/delete expects a session id".to_string()),
            None => ChatCommand::Delete(None),
        },
        "history" => ChatCommand::History,
        "attach" => match argument {
            Some(path) => ChatCommand::Attach(path.to_string()),
            None => ChatCommand::Invalid("/attach requires a file path".to_string()),
        },
        "detach" => ChatCommand::Detach,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "stream" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Stream(value),
            None => ChatCommand::Invalid("/stream expects 'on' or 'off'".to_string()),
        },
        "websearch" | "search" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::WebSearch(value),
            None => ChatCommand::Invalid("/websearch expects 'on' or 'off'".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_new_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::New {
            kind: SessionKind::Plain,
            title: None,
        };
    };

    let mut parts = arg.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    match first.parse::<SessionKind>() {
        Ok(kind) => ChatCommand::New {
            kind,
            title: parts
                .next()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        },
        Err(_) => ChatCommand::New {
            kind: SessionKind::Plain,
            title: Some(arg.to_string()),
        },
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /list                  List sessions, most recent first
  /refresh               Reload the session list from the server
  /new [kind] [title]    Create a session (kind: plain, kb, kg)
  /select <id>           Switch to a session
  /rename <title>        Rename the active session
  /delete [id]           Delete a session (default: the active one)
  /history               Show the messages of the active session
  /attach <file>         Attach a file to the next message
  /detach                Drop pending attachments
  /model <name>          Change the model
  /stream on|off         Stream replies token by token
  /websearch on|off      Ground replies in a web search
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while a reply streams to cancel it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_list() {
        assert_eq!(parse_command("/list"), Some(ChatCommand::List));
        assert_eq!(parse_command("/LS"), Some(ChatCommand::List));
        assert_eq!(parse_command("/refresh"), Some(ChatCommand::Refresh));
    }

    #[test]
    fn parse_new() {
        assert_eq!(
            parse_command("/new"),
            Some(ChatCommand::New {
                kind: SessionKind::Plain,
                title: None
            })
        );
        assert_eq!(
            parse_command("/new kb"),
            Some(ChatCommand::New {
                kind: SessionKind::KnowledgeBase,
                title: None
            })
        );
        assert_eq!(
            parse_command("/new kg  Graph notes "),
            Some(ChatCommand::New {
                kind: SessionKind::KnowledgeGraph,
                title: Some("Graph notes".to_string())
            })
        );
        assert_eq!(
            parse_command("/new Trip planning"),
            Some(ChatCommand::New {
                kind: SessionKind::Plain,
                title: Some("Trip planning".to_string())
            })
        );
    }

    #[test]
    fn parse_select_and_delete() {
        assert_eq!(
            parse_command("/select 42"),
            Some(ChatCommand::Select(SessionId(42)))
        );
        assert!(matches!(
            parse_command("/select abc"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
        assert!(matches!(
            parse_command("/select"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert_eq!(parse_command("/delete"), Some(ChatCommand::Delete(None)));
        assert_eq!(
            parse_command("/delete 7"),
            Some(ChatCommand::Delete(Some(SessionId(7))))
        );
    }

    #[test]
    fn parse_rename() {
        assert_eq!(
            parse_command("/rename Weekly sync"),
            Some(ChatCommand::Rename("Weekly sync".to_string()))
        );
        assert_eq!(
            parse_command("/rename"),
            Some(ChatCommand::Invalid("/rename requires a title".to_string()))
        );
    }

    #[test]
    fn parse_attachments() {
        assert_eq!(
            parse_command("/attach notes/report.pdf"),
            Some(ChatCommand::Attach("notes/report.pdf".to_string()))
        );
        assert_eq!(parse_command("/detach"), Some(ChatCommand::Detach));
    }

    #[test]
    fn parse_toggles() {
        assert_eq!(parse_command("/stream off"), Some(ChatCommand::Stream(false)));
        assert_eq!(parse_command("/websearch on"), Some(ChatCommand::WebSearch(true)));
        assert!(matches!(
            parse_command("/stream maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model   general  "),
            Some(ChatCommand::Model("general".to_string()))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(
                "/model requires a model name".to_string()
            ))
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/new"));
        assert!(help.contains("/select"));
        assert!(help.contains("/stream"));
    }
}
