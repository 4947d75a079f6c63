use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{FileInfo, SourceInfo};

/// A message as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Server-assigned identifier.
    pub id: i64,

    /// Message text.
    pub content: String,

    /// True when the user wrote the message.
    pub is_user: bool,

    /// Creation time.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Whether the reply used web search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<bool>,

    /// Sources cited by a web-search reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceInfo>>,

    /// Attachments sent with a user message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileInfo>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_reply_with_sources() {
        let message: ServerMessage = serde_json::from_value(json!({
            "id": 31,
            "content": "See the docs.",
            "is_user": false,
            "created_at": "2024-05-01T09:00:00.123456",
            "web_search": true,
            "sources": [{"title": "Docs", "url": "https://example.com", "snippet": null}]
        }))
        .unwrap();
        assert_eq!(message.id, 31);
        assert!(!message.is_user);
        assert_eq!(message.sources.as_ref().map(Vec::len), Some(1));
        assert_eq!(message.files, None);
    }
}
