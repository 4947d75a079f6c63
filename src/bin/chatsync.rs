//! Interactive client for a streaming chat backend.
//!
//! This binary keeps the session list of the signed-in user in sync with the server and
//! streams replies into the terminal as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Token from the environment, default backend
//! CHATSYNC_TOKEN=... chatsync
//!
//! # Another backend and model, complete replies instead of streams
//! chatsync --base-url https://chat.example.com/api/v1/ --model general --no-stream
//!
//! # Verbose engine logs on stderr
//! RUST_LOG=chatsync=debug chatsync
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/list` - List sessions
//! - `/new [kind] [title]` - Create a session
//! - `/select <id>` - Switch sessions
//! - `/attach <file>` - Attach a file to the next message
//! - `/help` - Show all commands
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

use chatsync::commands::{ChatCommand, help_text, parse_command};
use chatsync::{
    Attachment, ChatController, ClientArgs, ClientConfig, EnvCredentials, HttpChatApi,
    LogInvalidation, PlainTextRenderer, Renderer, Session, SessionKind, SessionList,
};

/// Main entry point for the chatsync application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ClientArgs::from_command_line_relaxed("chatsync [OPTIONS]");
    let config = ClientConfig::from(args);
    let use_color = config.use_color;

    let credentials = Arc::new(EnvCredentials::from_env()?);
    let api =
        HttpChatApi::new(&config, credentials)?.with_invalidation(Arc::new(LogInvalidation));
    let controller = Arc::new(ChatController::new(api, config));
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;
    let mut attachments: Vec<Attachment> = Vec::new();

    // Ctrl+C while a reply streams cancels it
    let interrupt_controller = Arc::clone(&controller);
    ctrlc::set_handler(move || {
        interrupt_controller.cancel_all();
    })?;

    controller.refresh_sessions().await?;
    let first = controller.sessions().ids().first().copied();
    match first {
        Some(id) => controller.select_session(id).await?,
        None => {
            controller.create_session(None, SessionKind::Plain).await?;
        }
    }

    println!("chatsync ({})", controller.api().base_url());
    if let Some(session) = controller.active_session() {
        println!("Session {}: {}", session.id(), session.title());
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::List => {
                            print_sessions(&controller.sessions());
                        }
                        ChatCommand::Refresh => match controller.refresh_sessions().await {
                            Ok(count) => renderer.print_info(&format!("{count} sessions.")),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::New { kind, title } => {
                            match controller.create_session(title.as_deref(), kind).await {
                                Ok(id) => renderer.print_info(&format!("Created session {id}.")),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Select(id) => match controller.select_session(id).await {
                            Ok(()) => {
                                if let Some(session) = controller.active_session() {
                                    renderer.print_info(&format!(
                                        "Session {}: {}",
                                        session.id(),
                                        session.title()
                                    ));
                                    print_history(&session);
                                }
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Rename(title) => {
                            let Some(id) = controller.active_id() else {
                                renderer.print_error("No active session.");
                                continue;
                            };
                            match controller.rename_session(id, &title).await {
                                Ok(()) => renderer.print_info("Session renamed."),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Delete(id) => {
                            let Some(id) = id.or_else(|| controller.active_id()) else {
                                renderer.print_error("No active session.");
                                continue;
                            };
                            match controller.delete_session(id).await {
                                Ok(()) => renderer.print_info(&format!("Deleted session {id}.")),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::History => match controller.active_session() {
                            Some(session) => print_history(&session),
                            None => renderer.print_error("No active session."),
                        },
                        ChatCommand::Attach(path) => match Attachment::read(&path).await {
                            Ok(attachment) => {
                                renderer.print_info(&format!(
                                    "Attached {} ({} bytes).",
                                    attachment.info.name, attachment.info.size
                                ));
                                attachments.push(attachment);
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Detach => {
                            attachments.clear();
                            renderer.print_info("Attachments cleared.");
                        }
                        ChatCommand::Model(model) => {
                            controller.set_model(Some(model.clone()));
                            renderer.print_info(&format!("Model changed to: {}", model));
                        }
                        ChatCommand::Stream(streaming) => {
                            controller.set_streaming(streaming);
                            if streaming {
                                renderer.print_info("Replies are streamed.");
                            } else {
                                renderer.print_info("Replies arrive complete.");
                            }
                        }
                        ChatCommand::WebSearch(web_search) => {
                            controller.set_web_search(web_search);
                            if web_search {
                                renderer.print_info("Web search enabled.");
                            } else {
                                renderer.print_info("Web search disabled.");
                            }
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&controller.config(), attachments.len());
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the active session
                let session = match controller.active_id() {
                    Some(id) => id,
                    None => match controller.create_session(None, SessionKind::Plain).await {
                        Ok(id) => id,
                        Err(err) => {
                            renderer.print_error(&err.to_string());
                            continue;
                        }
                    },
                };
                println!("Assistant:");
                let files = std::mem::take(&mut attachments);
                let result = if files.is_empty() {
                    controller.send(session, line, &mut renderer).await
                } else {
                    controller
                        .send_with_files(session, line, files, &mut renderer)
                        .await
                };
                // Failures past the compose step were already rendered by the controller.
                if let Err(err) = result
                    && (err.is_busy() || err.is_not_found())
                {
                    renderer.print_error(&err.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_sessions(sessions: &SessionList) {
    if sessions.is_empty() {
        println!("    (no sessions)");
        return;
    }
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    for session in sessions.iter() {
        let marker = if sessions.active_id() == Some(session.id()) {
            "*"
        } else {
            " "
        };
        let when = session.last_activity().format(&format).unwrap_or_default();
        println!(
            "    {marker} {:>6}  {when}  {:<5} {}",
            session.id(),
            session.kind().to_string(),
            session.title()
        );
    }
}

fn print_history(session: &Session) {
    for message in session.messages() {
        let author = if message.is_user() { "You" } else { "Assistant" };
        println!("{author}: {}", message.content());
        for file in message.files() {
            println!("    [file: {} ({} bytes)]", file.name, file.size);
        }
    }
    if let Some(error) = session.error() {
        println!("    (last send failed: {error})");
    }
}

fn print_config(config: &ClientConfig, pending_attachments: usize) {
    println!("    Current Configuration:");
    println!("      Backend: {}", config.base_url);
    println!(
        "      Model: {}",
        config.model.as_deref().unwrap_or("(server default)")
    );
    println!(
        "      Replies: {}",
        if config.streaming {
            "streamed"
        } else {
            "complete"
        }
    );
    println!(
        "      Web search: {}",
        if config.web_search { "on" } else { "off" }
    );
    println!(
        "      Request timeout: {}s",
        config.request_timeout.as_secs()
    );
    println!(
        "      Stream idle timeout: {}s",
        config.stream_idle_timeout.as_secs()
    );
    println!("      Pending attachments: {pending_attachments}");
}
