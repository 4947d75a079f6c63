//! The ordered session collection.
//!
//! [`SessionList`] is the only owner of sessions and, through them, of their messages.  It
//! keeps the collection sorted by last activity, newest first, and derives titles for
//! sessions that still carry the default one.

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::message::ChatMessage;
use crate::types::{SessionDetail, SessionId, SessionKind, SessionRecord};

/// Title every new session starts with.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Characters of the first message kept in a derived title.
pub const TITLE_SNIPPET_CHARS: usize = 20;

const ELLIPSIS: &str = "...";

/// The title given to a session whose first exchange was about `subject`.
pub fn conversation_title(subject: &str) -> String {
    format!("Conversation about {subject}")
}

/// The first [`TITLE_SNIPPET_CHARS`] characters of `content`, with an ellipsis if cut.
pub fn title_snippet(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(TITLE_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &content[..cut]),
        None => content.to_string(),
    }
}

/// A session and the messages it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    title: String,
    kind: SessionKind,
    created_at: OffsetDateTime,
    last_activity: OffsetDateTime,
    messages: Vec<ChatMessage>,
    loaded: bool,
    error: Option<String>,
}

impl Session {
    /// A session known only from its listing; messages are loaded on selection.
    pub fn from_record(record: SessionRecord) -> Self {
        let last_activity = record.last_activity();
        Self {
            id: record.id,
            title: record.title,
            kind: record.kind,
            created_at: record.created_at,
            last_activity,
            messages: Vec::new(),
            loaded: false,
            error: None,
        }
    }

    /// A session with its full history.
    pub fn from_detail(detail: SessionDetail) -> Self {
        let mut session = Self::from_record(detail.record);
        session.messages = detail
            .messages
            .into_iter()
            .map(ChatMessage::from_server)
            .collect();
        session.loaded = true;
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn last_activity(&self) -> OffsetDateTime {
        self.last_activity
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True once the message history has been fetched.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The failure of the most recent send, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while the title is still the default placeholder.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Number of messages written by the user.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    pub(crate) fn messages_mut(&mut self) -> &mut Vec<ChatMessage> {
        &mut self.messages
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    fn load(&mut self, detail: SessionDetail) {
        let fresh = Session::from_detail(detail);
        self.title = fresh.title;
        self.kind = fresh.kind;
        self.last_activity = self.last_activity.max(fresh.last_activity);
        self.messages = fresh.messages;
        self.loaded = true;
    }
}

/// Sessions ordered by last activity, newest first, plus the active selection.
#[derive(Debug, Clone, Default)]
pub struct SessionList {
    sessions: Vec<Session>,
    active: Option<SessionId>,
}

impl SessionList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the collection with a fresh server listing.
    ///
    /// Messages already held for sessions that are still listed are kept, whether fetched or
    /// sent locally.  The active selection is kept if its session survived.
    pub fn replace_all(&mut self, records: Vec<SessionRecord>) {
        let mut previous = std::mem::take(&mut self.sessions);
        self.sessions = records
            .into_iter()
            .map(|record| {
                let mut session = Session::from_record(record);
                if let Some(pos) = previous.iter().position(|s| s.id == session.id) {
                    let old = previous.swap_remove(pos);
                    if old.loaded || !old.messages.is_empty() {
                        session.messages = old.messages;
                        session.loaded = old.loaded;
                    }
                    session.last_activity = session.last_activity.max(old.last_activity);
                }
                session
            })
            .collect();
        self.sort();
        if let Some(active) = self.active
            && !self.contains(active)
        {
            self.active = None;
        }
    }

    /// Prepends a newly created session.
    pub fn insert_new(&mut self, session: Session) {
        self.sessions.retain(|s| s.id != session.id);
        self.sessions.insert(0, session);
    }

    /// Records activity on a session and re-sorts, newest first.
    ///
    /// The sort is stable: sessions with equal timestamps keep their relative order.
    /// Returns false if the session is unknown.
    pub fn touch(&mut self, id: SessionId, now: OffsetDateTime) -> bool {
        let Some(session) = self.get_mut(id) else {
            return false;
        };
        session.last_activity = now;
        self.sort();
        true
    }

    /// Titles a session after its first message if it still has the default title.
    ///
    /// Returns the new title when one was set.
    pub fn derive_title(
        &mut self,
        id: SessionId,
        content: &str,
        first_exchange: bool,
    ) -> Option<String> {
        self.retitle_default(id, &title_snippet(content), first_exchange)
    }

    /// Titles a session after the first attached file if it still has the default title.
    pub fn derive_file_title(
        &mut self,
        id: SessionId,
        file_name: &str,
        first_exchange: bool,
    ) -> Option<String> {
        self.retitle_default(id, file_name, first_exchange)
    }

    fn retitle_default(
        &mut self,
        id: SessionId,
        subject: &str,
        first_exchange: bool,
    ) -> Option<String> {
        if !first_exchange {
            return None;
        }
        let session = self.get_mut(id)?;
        if !session.has_default_title() {
            return None;
        }
        session.title = conversation_title(subject);
        Some(session.title.clone())
    }

    /// Sets a session's title unconditionally.
    pub fn set_title(&mut self, id: SessionId, title: impl Into<String>) -> Result<()> {
        let session = self.get_mut(id).ok_or_else(|| unknown_session(id))?;
        session.title = title.into();
        Ok(())
    }

    /// Installs a freshly fetched history for a session, inserting it if unknown.
    pub fn load(&mut self, detail: SessionDetail) {
        let id = detail.record.id;
        match self.get_mut(id) {
            Some(session) => session.load(detail),
            None => {
                self.sessions.push(Session::from_detail(detail));
                self.sort();
            }
        }
    }

    /// Deletes a session and its messages.
    ///
    /// If it was active, the new first session becomes active, or nothing if the list is
    /// now empty.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let pos = self.sessions.iter().position(|s| s.id == id)?;
        let removed = self.sessions.remove(pos);
        if self.active == Some(id) {
            self.active = self.sessions.first().map(|s| s.id);
        }
        Some(removed)
    }

    /// Makes a session the active one.
    pub fn select(&mut self, id: SessionId) -> Result<()> {
        if !self.contains(id) {
            return Err(unknown_session(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Clears the active selection.
    pub fn deselect(&mut self) {
        self.active = None;
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops every session and the selection.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.active = None;
    }

    fn sort(&mut self) {
        self.sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    }
}

fn unknown_session(id: SessionId) -> Error {
    Error::not_found(
        "unknown session",
        Some("session".to_string()),
        Some(id.to_string()),
    )
}
