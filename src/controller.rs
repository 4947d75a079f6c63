//! The stream session controller.
//!
//! Every send runs through the same steps:
//!
//! 1. Compose: an optimistic user message and an empty assistant placeholder are appended to
//!    the session.
//! 2. Commit: the user content is posted and the server id replaces the transient one in
//!    place.
//! 3. Stream: the reply stream is opened and its frames are applied to the placeholder in
//!    arrival order until the terminal sentinel or the end of the transport.
//! 4. Finalize: the placeholder is frozen, the session moves to the front of the list and a
//!    first exchange titles it.
//!
//! Any failure on the way writes a notice into the placeholder, records the error on the
//! session and returns it.  The session stays usable.
//!
//! At most one send runs per session; a second one is rejected with [`Error::Busy`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::assembler::DeltaAssembler;
use crate::client::ChatApi;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::logger::SyncLogger;
use crate::message::{
    ChatMessage, LocalIdGenerator, MessageId, REPLY_CANCELLED_NOTICE, REPLY_FAILED_NOTICE,
};
use crate::observability::{
    SEND_CANCELLED, SEND_COMPLETED, SEND_FAILED, SEND_REJECTED_BUSY, SEND_STALLED, SEND_STARTED,
    STREAM_BYTES, STREAM_DURATION, STREAM_FRAMES, STREAM_MALFORMED, STREAM_OVERSIZED,
    STREAM_TTFB,
};
use crate::render::Renderer;
use crate::sessions::{DEFAULT_TITLE, Session, SessionList};
use crate::sse::{Frame, FrameEvent, FrameParser, Utf8Decoder};
use crate::types::{
    Attachment, FileInfo, MessageCreate, ServerMessage, SessionDetail, SessionId, SessionKind,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unknown_session(id: SessionId) -> Error {
    Error::not_found(
        "unknown session",
        Some("session".to_string()),
        Some(id.to_string()),
    )
}

fn message_mut(
    sessions: &mut SessionList,
    session: SessionId,
    id: MessageId,
) -> Result<&mut ChatMessage> {
    sessions
        .get_mut(session)
        .ok_or_else(|| unknown_session(session))?
        .messages_mut()
        .iter_mut()
        .find(|message| message.id() == id)
        .ok_or_else(|| {
            Error::not_found(
                "message is gone",
                Some("message".to_string()),
                Some(id.to_string()),
            )
        })
}

/// What a first exchange titles the session after.
enum TitleSource {
    Content(String),
    File(String),
}

/// Marks a session busy until dropped.
struct InFlight<'a> {
    registry: &'a Mutex<HashMap<SessionId, CancellationToken>>,
    session: SessionId,
    token: CancellationToken,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.registry).remove(&self.session);
    }
}

/// Owns the session list and drives sends against a [`ChatApi`].
///
/// All methods take `&self`; share the controller behind an [`Arc`] to cancel from another
/// task or thread.  Internal locks are never held across an `.await`.
pub struct ChatController<A: ChatApi> {
    api: A,
    config: Mutex<ClientConfig>,
    sessions: Mutex<SessionList>,
    in_flight: Mutex<HashMap<SessionId, CancellationToken>>,
    ids: LocalIdGenerator,
    logger: Option<Arc<dyn SyncLogger>>,
}

impl<A: ChatApi> ChatController<A> {
    /// Creates a controller with an empty session list.
    pub fn new(api: A, config: ClientConfig) -> Self {
        Self {
            api,
            config: Mutex::new(config),
            sessions: Mutex::new(SessionList::new()),
            in_flight: Mutex::new(HashMap::new()),
            ids: LocalIdGenerator::new(),
            logger: None,
        }
    }

    /// Installs a logger that sees every confirmed message, frame and finished reply.
    pub fn with_logger(mut self, logger: Arc<dyn SyncLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The backend.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        lock(&self.config).clone()
    }

    /// Switches between streamed and complete replies for later sends.
    pub fn set_streaming(&self, streaming: bool) {
        lock(&self.config).streaming = streaming;
    }

    /// Turns web search on or off for later sends.
    pub fn set_web_search(&self, web_search: bool) {
        lock(&self.config).web_search = web_search;
    }

    /// Changes the model for later sends.
    pub fn set_model(&self, model: Option<String>) {
        lock(&self.config).model = model;
    }

    ///////////////////////////////////////// Sessions /////////////////////////////////////////

    /// A snapshot of the session list.
    pub fn sessions(&self) -> SessionList {
        lock(&self.sessions).clone()
    }

    /// A snapshot of one session.
    pub fn session(&self, id: SessionId) -> Option<Session> {
        lock(&self.sessions).get(id).cloned()
    }

    /// A snapshot of the active session.
    pub fn active_session(&self) -> Option<Session> {
        lock(&self.sessions).active().cloned()
    }

    pub fn active_id(&self) -> Option<SessionId> {
        lock(&self.sessions).active_id()
    }

    /// Replaces the session list with the server's.  Returns the number of sessions.
    pub async fn refresh_sessions(&self) -> Result<usize> {
        let records = self.api.list_sessions().await?;
        let mut sessions = lock(&self.sessions);
        sessions.replace_all(records);
        tracing::debug!(count = sessions.len(), "refreshed session list");
        Ok(sessions.len())
    }

    /// Creates a session, puts it first and selects it.
    pub async fn create_session(
        &self,
        title: Option<&str>,
        kind: SessionKind,
    ) -> Result<SessionId> {
        let record = self
            .api
            .create_session(title.unwrap_or(DEFAULT_TITLE), kind)
            .await?;
        let id = record.id;
        let mut sessions = lock(&self.sessions);
        sessions.insert_new(Session::from_detail(SessionDetail {
            record,
            messages: Vec::new(),
        }));
        sessions.select(id)?;
        tracing::info!(session = %id, %kind, "created session");
        Ok(id)
    }

    /// Selects a session, fetching its history first if it was never loaded.
    ///
    /// A session with a send in flight is not refetched.
    pub async fn select_session(&self, id: SessionId) -> Result<()> {
        let loaded = lock(&self.sessions)
            .get(id)
            .is_some_and(Session::is_loaded);
        if !loaded && !self.is_in_flight(id) {
            let detail = self.api.fetch_session(id).await?;
            lock(&self.sessions).load(detail);
        }
        lock(&self.sessions).select(id)
    }

    /// Renames a session on the server and locally.
    pub async fn rename_session(&self, id: SessionId, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation(
                "title must not be empty",
                Some("title".to_string()),
            ));
        }
        let record = self.api.update_title(id, title).await?;
        lock(&self.sessions).set_title(id, record.title)
    }

    /// Deletes a session, cancelling any send in flight on it.
    ///
    /// If the deleted session was active, the session that takes its place is loaded.
    pub async fn delete_session(&self, id: SessionId) -> Result<()> {
        self.cancel(id);
        self.api.delete_session(id).await?;
        let next = {
            let mut sessions = lock(&self.sessions);
            let was_active = sessions.active_id() == Some(id);
            sessions.remove(id);
            sessions.active_id().filter(|_| was_active)
        };
        tracing::info!(session = %id, "deleted session");
        if let Some(next) = next
            && let Err(err) = self.select_session(next).await
        {
            tracing::warn!(session = %next, error = %err, "could not load next session");
        }
        Ok(())
    }

    /// Cancels every send and forgets all sessions, e.g. on logout.
    pub fn clear(&self) {
        self.cancel_all();
        lock(&self.sessions).clear();
    }

    ////////////////////////////////////////// Sends ///////////////////////////////////////////

    /// True while a send on `id` is running.
    pub fn is_in_flight(&self, id: SessionId) -> bool {
        lock(&self.in_flight).contains_key(&id)
    }

    /// Cancels the send running on `id`.  Returns false if there was none.
    pub fn cancel(&self, id: SessionId) -> bool {
        match lock(&self.in_flight).get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running send.  Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let in_flight = lock(&self.in_flight);
        for token in in_flight.values() {
            token.cancel();
        }
        in_flight.len()
    }

    /// Sends `content` to a session and waits for the reply.
    ///
    /// Returns the assistant message as it ended up in the session.  On failure the
    /// placeholder already holds a notice and the error is recorded on the session.
    pub async fn send(
        &self,
        session: SessionId,
        content: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<ChatMessage> {
        self.submit(session, content.to_string(), Vec::new(), renderer)
            .await
    }

    /// Sends `content` with attached files as a multipart upload.
    ///
    /// A first exchange titles the session after the first file.
    pub async fn send_with_files(
        &self,
        session: SessionId,
        content: &str,
        files: Vec<Attachment>,
        renderer: &mut dyn Renderer,
    ) -> Result<ChatMessage> {
        self.submit(session, content.to_string(), files, renderer)
            .await
    }

    async fn submit(
        &self,
        session: SessionId,
        content: String,
        attachments: Vec<Attachment>,
        renderer: &mut dyn Renderer,
    ) -> Result<ChatMessage> {
        let in_flight = self.acquire(session)?;
        if let Err(err) = self.ensure_loaded(session).await {
            if !err.is_not_found() {
                SEND_FAILED.click();
                renderer.print_error(&err.to_string());
            }
            return Err(err);
        }
        let config = self.config();

        let files: Vec<FileInfo> = attachments.iter().map(|a| a.info.clone()).collect();
        let title_source = match files.first() {
            Some(file) => TitleSource::File(file.name.clone()),
            None => TitleSource::Content(content.clone()),
        };
        let user_id = self.ids.next_id();
        let reply_id = self.ids.next_id();
        let first_exchange = self.compose(session, user_id, reply_id, &content, files.clone())?;
        SEND_STARTED.click();
        tracing::debug!(session = %session, streaming = config.streaming, "send started");

        let body = MessageCreate::new(content)
            .with_model(config.model.clone())
            .with_web_search(config.web_search)
            .with_stream(config.streaming)
            .with_files(files);
        let exchanged = self
            .exchange(
                session,
                user_id,
                reply_id,
                &body,
                &attachments,
                &config,
                &in_flight.token,
                renderer,
            )
            .await;
        let result = match exchanged {
            Ok((user, reply)) => {
                self.complete(session, user, reply, first_exchange, &title_source, renderer)
                    .await
            }
            Err(err) => Err(err),
        };
        result.map_err(|err| self.fail(session, reply_id, err, renderer))
    }

    fn acquire(&self, session: SessionId) -> Result<InFlight<'_>> {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.contains_key(&session) {
            SEND_REJECTED_BUSY.click();
            return Err(Error::busy(session));
        }
        let token = CancellationToken::new();
        in_flight.insert(session, token.clone());
        Ok(InFlight {
            registry: &self.in_flight,
            session,
            token,
        })
    }

    /// Fetches the history of a session that was never loaded.
    ///
    /// Runs under the in-flight guard, so no concurrent select refetches it.
    async fn ensure_loaded(&self, session: SessionId) -> Result<()> {
        let loaded = match lock(&self.sessions).get(session) {
            Some(target) => target.is_loaded(),
            None => return Err(unknown_session(session)),
        };
        if !loaded {
            let detail = self.api.fetch_session(session).await?;
            lock(&self.sessions).load(detail);
        }
        Ok(())
    }

    /// Appends the optimistic pair.  Returns whether this is the session's first exchange.
    fn compose(
        &self,
        session: SessionId,
        user_id: MessageId,
        reply_id: MessageId,
        content: &str,
        files: Vec<FileInfo>,
    ) -> Result<bool> {
        let mut sessions = lock(&self.sessions);
        let target = sessions
            .get_mut(session)
            .ok_or_else(|| unknown_session(session))?;
        let first_exchange = target.user_message_count() == 0;
        target.set_error(None);
        let messages = target.messages_mut();
        messages.push(ChatMessage::user(user_id, content, files));
        messages.push(ChatMessage::placeholder(reply_id));
        Ok(first_exchange)
    }

    /// Commits the user message and obtains the reply.  Returns the reconciled user id and
    /// the reply's id.
    #[allow(clippy::too_many_arguments)]
    async fn exchange(
        &self,
        session: SessionId,
        user_id: MessageId,
        reply_id: MessageId,
        body: &MessageCreate,
        attachments: &[Attachment],
        config: &ClientConfig,
        token: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<(MessageId, MessageId)> {
        let confirmed = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(Error::cancelled("send cancelled before the server confirmed it"));
            }
            confirmed = self.post(session, body, attachments) => confirmed?,
        };
        if let Some(logger) = &self.logger {
            for message in &confirmed {
                logger.log_confirmed(session, message);
            }
        }
        let mut confirmed = confirmed.into_iter();
        let user = confirmed
            .next()
            .ok_or_else(|| Error::serialization("server confirmed no message", None))?;
        message_mut(&mut lock(&self.sessions), session, user_id)?.reconcile(user.id)?;
        let user_id = MessageId::Server(user.id);

        if body.stream {
            self.stream_reply(session, reply_id, config, token, renderer)
                .await?;
            Ok((user_id, reply_id))
        } else {
            let reply = confirmed
                .next()
                .ok_or_else(|| Error::serialization("server returned no reply", None))?;
            let reply_id = self.install_reply(session, reply_id, reply, renderer)?;
            Ok((user_id, reply_id))
        }
    }

    async fn post(
        &self,
        session: SessionId,
        body: &MessageCreate,
        attachments: &[Attachment],
    ) -> Result<Vec<ServerMessage>> {
        if attachments.is_empty() {
            self.api.post_message(session, body).await
        } else {
            self.api
                .post_message_with_files(session, body, attachments)
                .await
        }
    }

    /// Puts a complete reply where the placeholder was.
    fn install_reply(
        &self,
        session: SessionId,
        reply_id: MessageId,
        reply: ServerMessage,
        renderer: &mut dyn Renderer,
    ) -> Result<MessageId> {
        let reply = ChatMessage::from_server(reply);
        let id = reply.id();
        renderer.print_text(reply.content());
        renderer.print_sources(reply.sources());
        *message_mut(&mut lock(&self.sessions), session, reply_id)? = reply;
        Ok(id)
    }

    async fn stream_reply(
        &self,
        session: SessionId,
        reply_id: MessageId,
        config: &ClientConfig,
        token: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        message_mut(&mut lock(&self.sessions), session, reply_id)?.begin_streaming()?;

        let started = Instant::now();
        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(Error::cancelled("reply cancelled before the stream opened"));
            }
            stream = self.api.open_stream(session) => stream?,
        };

        let idle = config.stream_idle_timeout;
        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::with_max_frame_bytes(config.max_frame_bytes);
        let mut assembler = DeltaAssembler::new(reply_id);
        let mut first_chunk = true;
        while !parser.is_finished() {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::cancelled("reply cancelled")),
                next = tokio::time::timeout(idle, stream.next()) => next,
            };
            let chunk = match next {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => return Err(Error::stalled(idle.as_secs_f64())),
            };
            if first_chunk {
                STREAM_TTFB.add(started.elapsed().as_secs_f64());
                first_chunk = false;
            }
            STREAM_BYTES.count(chunk.len() as u64);
            let text = decoder.decode(&chunk)?;
            for event in parser.feed(&text) {
                self.apply_event(session, &mut assembler, event, renderer)?;
            }
        }
        drop(stream);
        // The transport closed without the sentinel; a trailing frame may still be pending.
        if !parser.is_finished() {
            decoder.finish()?;
            if let Some(event) = parser.finish() {
                self.apply_event(session, &mut assembler, event, renderer)?;
            }
        }
        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        tracing::debug!(
            session = %session,
            frames = assembler.frames_applied(),
            chars = assembler.content_chars(),
            "reply stream ended"
        );
        message_mut(&mut lock(&self.sessions), session, reply_id)?.finalize()
    }

    fn apply_event(
        &self,
        session: SessionId,
        assembler: &mut DeltaAssembler,
        event: FrameEvent,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        if let Some(logger) = &self.logger {
            logger.log_frame(session, &event);
        }
        match event {
            FrameEvent::Frame(Frame::Delta(delta)) => {
                STREAM_FRAMES.click();
                let fragment = {
                    let mut sessions = lock(&self.sessions);
                    let target = sessions
                        .get_mut(session)
                        .ok_or_else(|| unknown_session(session))?;
                    assembler.apply(target.messages_mut(), &delta)?
                };
                renderer.print_text(fragment);
            }
            FrameEvent::Frame(Frame::Start) => {
                tracing::trace!(session = %session, "reply stream started");
            }
            FrameEvent::Frame(Frame::Done) => {
                tracing::trace!(session = %session, "reply stream done");
            }
            FrameEvent::Malformed { payload, reason } => {
                STREAM_MALFORMED.click();
                tracing::warn!(session = %session, %payload, %reason, "skipping malformed frame");
            }
            FrameEvent::Oversized { discarded } => {
                STREAM_OVERSIZED.click();
                tracing::warn!(session = %session, discarded, "skipping oversized frame");
            }
        }
        Ok(())
    }

    async fn complete(
        &self,
        session: SessionId,
        user: MessageId,
        reply: MessageId,
        first_exchange: bool,
        title_source: &TitleSource,
        renderer: &mut dyn Renderer,
    ) -> Result<ChatMessage> {
        let (message, title) = {
            let mut sessions = lock(&self.sessions);
            message_mut(&mut sessions, session, user)?.finalize()?;
            let message = message_mut(&mut sessions, session, reply)?.clone();
            sessions.touch(session, OffsetDateTime::now_utc());
            let title = match title_source {
                TitleSource::Content(content) => {
                    sessions.derive_title(session, content, first_exchange)
                }
                TitleSource::File(name) => {
                    sessions.derive_file_title(session, name, first_exchange)
                }
            };
            (message, title)
        };
        if let Some(title) = title
            && let Err(err) = self.api.update_title(session, &title).await
        {
            tracing::warn!(session = %session, error = %err, "could not store derived title");
        }
        if let Some(logger) = &self.logger {
            logger.log_reply(session, &message);
        }
        SEND_COMPLETED.click();
        renderer.finish_response();
        Ok(message)
    }

    /// Turns a failed send into message and session state.  Returns the error.
    fn fail(
        &self,
        session: SessionId,
        reply_id: MessageId,
        err: Error,
        renderer: &mut dyn Renderer,
    ) -> Error {
        if err.is_cancelled() {
            SEND_CANCELLED.click();
        } else if err.is_stalled() {
            SEND_STALLED.click();
        } else {
            SEND_FAILED.click();
        }
        let reply = {
            let mut sessions = lock(&self.sessions);
            let reply = match message_mut(&mut sessions, session, reply_id) {
                Ok(message) => {
                    let marked = if !err.is_cancelled() {
                        message.fail(REPLY_FAILED_NOTICE)
                    } else if message.content().is_empty() {
                        message.fail(REPLY_CANCELLED_NOTICE)
                    } else {
                        message.interrupt()
                    };
                    if let Err(e) = marked {
                        tracing::debug!(
                            reply = %reply_id,
                            error = %e,
                            "placeholder already settled"
                        );
                    }
                    Some(message.clone())
                }
                Err(_) => None,
            };
            if let Some(target) = sessions.get_mut(session) {
                target.set_error(Some(err.to_string()));
            }
            reply
        };
        if let (Some(logger), Some(reply)) = (&self.logger, &reply) {
            logger.log_reply(session, reply);
        }
        if err.is_cancelled() {
            tracing::info!(session = %session, "send cancelled");
            renderer.print_interrupted();
        } else {
            tracing::warn!(session = %session, error = %err, "send failed");
            renderer.print_error(&err.to_string());
        }
        err
    }
}
