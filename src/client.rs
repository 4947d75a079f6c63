use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{CredentialStore, SessionInvalidation};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UNAUTHORIZED,
};
use crate::types::{
    Attachment, MessageCreate, ServerMessage, SessionDetail, SessionId, SessionKind,
    SessionRecord,
};

/// A boxed stream of raw reply bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// The chat backend, as seen by the synchronization engine.
///
/// [`HttpChatApi`] talks to a real server; tests substitute an in-memory implementation.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// List the user's sessions.
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>>;

    /// Create a session.
    async fn create_session(&self, title: &str, kind: SessionKind) -> Result<SessionRecord>;

    /// Fetch one session with its messages.
    async fn fetch_session(&self, id: SessionId) -> Result<SessionDetail>;

    /// Rename a session.
    async fn update_title(&self, id: SessionId, title: &str) -> Result<SessionRecord>;

    /// Delete a session.
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    /// Post a user message.
    ///
    /// The response holds the confirmed user message first and, unless the reply is
    /// streamed, the assistant reply second.
    async fn post_message(&self, id: SessionId, body: &MessageCreate)
    -> Result<Vec<ServerMessage>>;

    /// Post a user message with attached files as a multipart form.
    async fn post_message_with_files(
        &self,
        id: SessionId,
        body: &MessageCreate,
        files: &[Attachment],
    ) -> Result<Vec<ServerMessage>>;

    /// Open the read-only reply stream of a session.
    async fn open_stream(&self, id: SessionId) -> Result<ByteStream>;
}

/// HTTP implementation of [`ChatApi`].
#[derive(Clone)]
pub struct HttpChatApi {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    credentials: Arc<dyn CredentialStore>,
    invalidation: Option<Arc<dyn SessionInvalidation>>,
}

impl HttpChatApi {
    /// Create a new client for the backend described by `config`.
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let timeout = config.request_timeout;
        // No client-wide timeout: it would also cap how long a reply may stream.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            credentials,
            invalidation: None,
        })
    }

    /// Report rejected credentials to `invalidation`.
    pub fn with_invalidation(mut self, invalidation: Arc<dyn SessionInvalidation>) -> Self {
        self.invalidation = Some(invalidation);
        self
    }

    /// The backend root.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(|| Error::authentication("no bearer token available"))?;
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            Error::authentication("bearer token contains characters not allowed in a header")
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Send a request with auth headers and map failures onto [`Error`].
    async fn execute(&self, request: RequestBuilder, headers: HeaderMap) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = request.headers(headers).send().await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            if let Error::Authentication { message } = &err {
                CLIENT_UNAUTHORIZED.click();
                if let Some(invalidation) = &self.invalidation {
                    invalidation.credential_rejected(message);
                }
            }
            return Err(err);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // FastAPI reports failures as {"detail": "..."}.
        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<serde_json::Value>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.detail)
            .map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or(error_body);

        match status_code {
            400 | 422 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            404 => Error::not_found(error_message, None, None),
            408 => Error::timeout(error_message, None),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_message),
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[derive(serde::Serialize)]
struct CreateSessionBody<'a> {
    title: &'a str,
    #[serde(rename = "type")]
    kind: SessionKind,
}

#[derive(serde::Serialize)]
struct UpdateTitleBody<'a> {
    title: &'a str,
}

#[async_trait::async_trait]
impl ChatApi for HttpChatApi {
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let url = self.endpoint("chat/sessions")?;
        let request = self.client.get(url).timeout(self.timeout);
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn create_session(&self, title: &str, kind: SessionKind) -> Result<SessionRecord> {
        let url = self.endpoint("chat/sessions")?;
        let request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&CreateSessionBody { title, kind });
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn fetch_session(&self, id: SessionId) -> Result<SessionDetail> {
        let url = self.endpoint(&format!("chat/sessions/{id}"))?;
        let request = self.client.get(url).timeout(self.timeout);
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn update_title(&self, id: SessionId, title: &str) -> Result<SessionRecord> {
        let url = self.endpoint(&format!("chat/sessions/{id}"))?;
        let request = self
            .client
            .put(url)
            .timeout(self.timeout)
            .json(&UpdateTitleBody { title });
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        let url = self.endpoint(&format!("chat/sessions/{id}"))?;
        let request = self.client.delete(url).timeout(self.timeout);
        self.execute(request, self.default_headers()?).await?;
        Ok(())
    }

    async fn post_message(
        &self,
        id: SessionId,
        body: &MessageCreate,
    ) -> Result<Vec<ServerMessage>> {
        let url = self.endpoint(&format!("chat/sessions/{id}/messages"))?;
        let request = self.client.post(url).timeout(self.timeout).json(body);
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn post_message_with_files(
        &self,
        id: SessionId,
        body: &MessageCreate,
        files: &[Attachment],
    ) -> Result<Vec<ServerMessage>> {
        let url = self.endpoint(&format!("chat/sessions/{id}/messages/with-files"))?;
        let mut form = Form::new()
            .text("content", body.content.clone())
            .text("model", body.model.clone().unwrap_or_default())
            .text("web_search", body.web_search.to_string());
        for file in files {
            let mut part = Part::bytes(file.data.to_vec()).file_name(file.info.name.clone());
            if let Some(media_type) = &file.info.media_type {
                part = part.mime_str(media_type).map_err(|e| {
                    Error::validation(
                        format!("invalid media type {media_type:?}: {e}"),
                        Some(file.info.name.clone()),
                    )
                })?;
            }
            form = form.part("files", part);
        }
        let request = self.client.post(url).timeout(self.timeout).multipart(form);
        let response = self.execute(request, self.default_headers()?).await?;
        Self::json(response).await
    }

    async fn open_stream(&self, id: SessionId) -> Result<ByteStream> {
        let url = self.endpoint(&format!("chat/sessions/{id}/messages/stream"))?;
        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let response = self.execute(self.client.get(url), headers).await?;

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn api(base_url: &str) -> HttpChatApi {
        let config = ClientConfig::new()
            .with_base_url(base_url)
            .with_request_timeout(Duration::from_secs(3));
        HttpChatApi::new(&config, Arc::new(StaticToken::new("secret"))).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let api = api("http://localhost:8000/api/v1");
        assert_eq!(api.base_url().as_str(), "http://localhost:8000/api/v1/");
        assert_eq!(api.timeout, Duration::from_secs(3));
    }

    #[test]
    fn endpoints_join_onto_base() {
        let api = api("https://chat.example.com/api/v1/");
        assert_eq!(
            api.endpoint("chat/sessions/4/messages/stream")
                .unwrap()
                .as_str(),
            "https://chat.example.com/api/v1/chat/sessions/4/messages/stream"
        );
    }

    #[test]
    fn bearer_header() {
        let api = api("http://localhost:8000/");
        let headers = api.default_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn missing_token_is_an_authentication_error() {
        let config = ClientConfig::new();
        let api = HttpChatApi::new(&config, Arc::new(StaticToken::default())).unwrap();
        assert!(api.default_headers().unwrap_err().is_authentication());
    }

    #[test]
    fn create_body_uses_type_key() {
        let body = CreateSessionBody {
            title: "New conversation",
            kind: SessionKind::KnowledgeGraph,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"title": "New conversation", "type": 3})
        );
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_error() {
        // Port 9 (discard) is closed on test machines.
        let api = api("http://127.0.0.1:9/");
        let err = api.list_sessions().await.unwrap_err();
        assert!(err.is_connection() || err.is_timeout(), "{err:?}");
    }
}
