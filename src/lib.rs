// Public modules
pub mod assembler;
pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod logger;
pub mod message;
pub mod observability;
pub mod render;
pub mod sessions;
pub mod sse;
pub mod types;
pub mod utils;

// Re-exports
pub use assembler::DeltaAssembler;
pub use auth::{CredentialStore, EnvCredentials, LogInvalidation, SessionInvalidation, StaticToken};
pub use client::{ByteStream, ChatApi, HttpChatApi};
pub use config::{ClientArgs, ClientConfig};
pub use controller::ChatController;
pub use error::{Error, Result};
pub use logger::SyncLogger;
pub use message::{ChatMessage, LocalIdGenerator, MessageId, MessageState, Origin};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use sessions::{Session, SessionList};
pub use sse::{Frame, FrameEvent, FrameParser, Utf8Decoder};
pub use types::*;
