use serde::{Deserialize, Serialize};

use crate::types::FileInfo;

/// Body of a "post message" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreate {
    /// The user's text.
    pub content: String,

    /// Model the backend should answer with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Ask the backend to ground the answer in a web search.
    #[serde(default)]
    pub web_search: bool,

    /// When true the reply is fetched from the stream endpoint instead of this response.
    #[serde(default)]
    pub stream: bool,

    /// Descriptors of attached files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileInfo>>,
}

impl MessageCreate {
    /// Create a request carrying only text.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            web_search: false,
            stream: false,
            files: None,
        }
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

    /// Sets the stream flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the attached file descriptors.
    pub fn with_files(mut self, files: Vec<FileInfo>) -> Self {
        self.files = if files.is_empty() { None } else { Some(files) };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_body() {
        let body = MessageCreate::new("hi");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"content": "hi", "web_search": false, "stream": false})
        );
    }

    #[test]
    fn empty_files_are_omitted() {
        let body = MessageCreate::new("hi").with_files(Vec::new());
        assert_eq!(body.files, None);
    }
}
