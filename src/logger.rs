//! Hook for recording everything the synchronization engine sees.
//!
//! This module provides the [`SyncLogger`] trait.  Install one on the
//! [`ChatController`](crate::ChatController) to capture confirmed messages and the raw frame
//! events of every reply stream, e.g. for transcripts or debugging a misbehaving backend.

use crate::message::ChatMessage;
use crate::sse::FrameEvent;
use crate::types::{ServerMessage, SessionId};

/// A trait for logging synchronization activity.
///
/// # Example
///
/// ```rust,ignore
/// use chatsync::{ChatMessage, FrameEvent, ServerMessage, SessionId, SyncLogger};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl SyncLogger for FileLogger {
///     fn log_confirmed(&self, session: SessionId, message: &ServerMessage) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session}: confirmed {}", message.id).unwrap();
///     }
///
///     fn log_frame(&self, session: SessionId, event: &FrameEvent) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session}: {event:?}").unwrap();
///     }
///
///     fn log_reply(&self, session: SessionId, message: &ChatMessage) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "{session}: reply {}", message.content()).unwrap();
///     }
/// }
/// ```
pub trait SyncLogger: Send + Sync {
    /// Log a message the server confirmed in a post response.
    fn log_confirmed(&self, session: SessionId, message: &ServerMessage);

    /// Log every event the frame parser yields, skipped frames included.
    fn log_frame(&self, session: SessionId, event: &FrameEvent);

    /// Log the assistant message once its reply reached a terminal state.
    fn log_reply(&self, session: SessionId, message: &ChatMessage);
}
