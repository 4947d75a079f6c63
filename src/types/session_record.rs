use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{ServerMessage, SessionId, SessionKind};

/// A session as listed by the server, without its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Server-assigned identifier.
    pub id: SessionId,

    /// Display title.
    pub title: String,

    /// Backing kind; older servers omit it.
    #[serde(rename = "type", default)]
    pub kind: SessionKind,

    /// When the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Last activity; servers leave it null until the first message.
    #[serde(default, with = "crate::utils::time::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl SessionRecord {
    /// The timestamp the session list is ordered by.
    pub fn last_activity(&self) -> OffsetDateTime {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// A session together with its full message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    /// The session itself.
    #[serde(flatten)]
    pub record: SessionRecord,

    /// Messages in conversation order.
    #[serde(default)]
    pub messages: Vec<ServerMessage>,
}
