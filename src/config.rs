//! Configuration for the chat client.
//!
//! [`ClientConfig`] holds resolved settings with defaults; [`ClientArgs`] parses them from the
//! command line via `arrrg`.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::sse::DEFAULT_MAX_FRAME_BYTES;

/// Default backend root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1/";

/// Default model the backend is asked to answer with when streaming.
pub const DEFAULT_MODEL: &str = "deepseek";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the chatsync tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ClientArgs {
    /// Backend root URL.
    #[arrrg(optional, "Backend root URL (default: http://localhost:8000/api/v1/)", "URL")]
    pub base_url: Option<String>,

    /// Model to request.
    #[arrrg(optional, "Model to answer with (default: deepseek)", "MODEL")]
    pub model: Option<String>,

    /// Per-request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout: Option<u64>,

    /// Idle timeout for reply streams in seconds.
    #[arrrg(optional, "Reply stream idle timeout in seconds (default: 60)", "SECS")]
    pub idle_timeout: Option<u64>,

    /// Ask the backend for a web search.
    #[arrrg(flag, "Ground answers in a web search")]
    pub web_search: bool,

    /// Wait for complete replies instead of streaming them.
    #[arrrg(flag, "Disable token-by-token streaming")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend root; endpoint paths are joined onto it.
    pub base_url: String,

    /// Timeout for plain request/response calls.
    pub request_timeout: Duration,

    /// A reply stream that delivers nothing for this long fails as stalled.
    pub stream_idle_timeout: Duration,

    /// Cap on a single unterminated frame.
    pub max_frame_bytes: usize,

    /// Model name sent with each message.
    pub model: Option<String>,

    /// Whether to request a web search with each message.
    pub web_search: bool,

    /// Whether replies are streamed token by token.
    pub streaming: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ClientConfig {
    /// Creates a new ClientConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: http://localhost:8000/api/v1/
    /// - Request timeout and stream idle timeout: 60 seconds
    /// - Max frame size: 1 MiB
    /// - Model: deepseek, streaming on, web search off
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: DEFAULT_STREAM_IDLE_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            model: Some(DEFAULT_MODEL.to_string()),
            web_search: false,
            streaming: true,
            use_color: true,
        }
    }

    /// Sets the backend root.  A trailing slash is added if missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the stream idle timeout.
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    /// Sets the frame size cap.
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Sets the web-search flag.
    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }

    /// Enables or disables streaming replies.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        let mut config = ClientConfig::new();
        if let Some(base_url) = args.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = args.model {
            config.model = Some(model);
        }
        if let Some(secs) = args.timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.idle_timeout {
            config.stream_idle_timeout = Duration::from_secs(secs);
        }
        ClientConfig {
            web_search: args.web_search,
            streaming: !args.no_stream,
            use_color: !args.no_color,
            ..config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(60));
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(config.model.as_deref(), Some("deepseek"));
        assert!(config.streaming);
        assert!(!config.web_search);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ClientConfig::from(ClientArgs::default());
        assert_eq!(config, ClientConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ClientArgs {
            base_url: Some("https://chat.example.com/api".to_string()),
            model: Some("general".to_string()),
            timeout: Some(5),
            idle_timeout: Some(15),
            web_search: true,
            no_stream: true,
            no_color: true,
        };
        let config = ClientConfig::from(args);
        assert_eq!(config.base_url, "https://chat.example.com/api/");
        assert_eq!(config.model.as_deref(), Some("general"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(15));
        assert!(config.web_search);
        assert!(!config.streaming);
        assert!(!config.use_color);
    }

    #[test]
    fn config_builder_pattern() {
        let config = ClientConfig::new()
            .with_base_url("http://127.0.0.1:9000/v1/")
            .with_request_timeout(Duration::from_secs(2))
            .with_stream_idle_timeout(Duration::from_millis(500))
            .with_max_frame_bytes(4096)
            .with_model(None)
            .with_web_search(true)
            .with_streaming(false)
            .without_color();
        assert_eq!(config.base_url, "http://127.0.0.1:9000/v1/");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.stream_idle_timeout, Duration::from_millis(500));
        assert_eq!(config.max_frame_bytes, 4096);
        assert_eq!(config.model, None);
        assert!(config.web_search);
        assert!(!config.streaming);
        assert!(!config.use_color);
    }
}
