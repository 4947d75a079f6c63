//! Per-message lifecycle.
//!
//! A message starts `Optimistic` under a client-generated id.  Once the server confirms it,
//! the id is swapped in place and the message becomes `Reconciled`.  The assistant
//! placeholder of a streamed reply additionally passes through `Streaming`, the only state in
//! which content may grow.  `Final` and `Errored` are terminal.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{FileInfo, ServerMessage, SourceInfo};

/// Notice written into a placeholder whose reply failed.
pub const REPLY_FAILED_NOTICE: &str = "The reply could not be completed. Please try again.";

/// Notice written into an empty placeholder whose reply was cancelled.
pub const REPLY_CANCELLED_NOTICE: &str = "The reply was cancelled.";

/// Identifier of a message, transient until the server confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Client-generated, never sent to the server.
    Local(u64),
    /// Assigned by the server.
    Server(i64),
}

impl MessageId {
    /// True for server-assigned ids.
    pub fn is_server(&self) -> bool {
        matches!(self, MessageId::Server(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(id) => write!(f, "local:{id}"),
            MessageId::Server(id) => write!(f, "{id}"),
        }
    }
}

/// Hands out transient message ids.
///
/// Ids are seeded from the wall clock in milliseconds and strictly increase afterwards, so
/// two messages created in the same millisecond still get distinct ids.
#[derive(Debug)]
pub struct LocalIdGenerator {
    next: AtomicU64,
}

impl LocalIdGenerator {
    /// Creates a generator seeded from the current time.
    pub fn new() -> Self {
        let millis = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).max(0);
        Self::starting_at(millis as u64)
    }

    /// Creates a generator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns a fresh transient id.
    pub fn next_id(&self) -> MessageId {
        MessageId::Local(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LocalIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    User,
    Assistant,
}

/// Lifecycle state of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageState {
    /// Created locally, not yet confirmed.
    Optimistic,
    /// Server id assigned.
    Reconciled,
    /// Assistant placeholder receiving streamed content.
    Streaming,
    /// Complete; immutable.
    Final,
    /// Failed; content holds a notice; immutable.
    Errored,
}

impl MessageState {
    /// True once no further mutation is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Final | MessageState::Errored)
    }
}

/// A message held in a session's message list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    id: MessageId,
    content: String,
    origin: Origin,
    state: MessageState,
    created_at: OffsetDateTime,
    files: Vec<FileInfo>,
    sources: Vec<SourceInfo>,
}

impl ChatMessage {
    /// An optimistic user message.
    pub fn user(id: MessageId, content: impl Into<String>, files: Vec<FileInfo>) -> Self {
        Self {
            id,
            content: content.into(),
            origin: Origin::User,
            state: MessageState::Optimistic,
            created_at: OffsetDateTime::now_utc(),
            files,
            sources: Vec::new(),
        }
    }

    /// An empty optimistic assistant placeholder.
    pub fn placeholder(id: MessageId) -> Self {
        Self {
            id,
            content: String::new(),
            origin: Origin::Assistant,
            state: MessageState::Optimistic,
            created_at: OffsetDateTime::now_utc(),
            files: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// A message the server already confirmed in full.
    pub fn from_server(message: ServerMessage) -> Self {
        Self {
            id: MessageId::Server(message.id),
            content: message.content,
            origin: if message.is_user {
                Origin::User
            } else {
                Origin::Assistant
            },
            state: MessageState::Final,
            created_at: message.created_at,
            files: message.files.unwrap_or_default(),
            sources: message.sources.unwrap_or_default(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    /// Swap in the server id.  Content and position are untouched.
    pub fn reconcile(&mut self, server_id: i64) -> Result<()> {
        match self.state {
            MessageState::Optimistic => {
                self.id = MessageId::Server(server_id);
                self.state = MessageState::Reconciled;
                Ok(())
            }
            state => Err(self.illegal("reconcile", state)),
        }
    }

    /// Open the placeholder for appended content.
    pub fn begin_streaming(&mut self) -> Result<()> {
        if self.origin != Origin::Assistant {
            return Err(Error::validation(
                "only the assistant placeholder can stream",
                Some(self.id.to_string()),
            ));
        }
        match self.state {
            MessageState::Optimistic | MessageState::Reconciled => {
                self.state = MessageState::Streaming;
                Ok(())
            }
            state => Err(self.illegal("begin streaming", state)),
        }
    }

    /// Append a streamed fragment.
    pub fn append(&mut self, fragment: &str) -> Result<()> {
        if self.state != MessageState::Streaming {
            return Err(self.illegal("append to", self.state));
        }
        self.content.push_str(fragment);
        Ok(())
    }

    /// Commit the message.  No further mutation is permitted.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.illegal("finalize", self.state));
        }
        self.state = MessageState::Final;
        Ok(())
    }

    /// Overwrite the content with `notice` and mark the message errored.
    pub fn fail(&mut self, notice: &str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.illegal("fail", self.state));
        }
        self.content = notice.to_string();
        self.state = MessageState::Errored;
        Ok(())
    }

    /// Mark the message errored but keep whatever content it accumulated.
    pub fn interrupt(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.illegal("interrupt", self.state));
        }
        self.state = MessageState::Errored;
        Ok(())
    }

    fn illegal(&self, action: &str, state: MessageState) -> Error {
        Error::validation(
            format!("cannot {action} message {} in state {state:?}", self.id),
            Some(self.id.to_string()),
        )
    }
}
