use std::fmt;

use serde::{Deserialize, Serialize};

/// What backs the answers in a session.
///
/// The backend encodes this as a small integer in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SessionKind {
    /// Plain question answering.
    #[default]
    Plain,
    /// Answers grounded in a document knowledge base.
    KnowledgeBase,
    /// Answers grounded in a knowledge graph.
    KnowledgeGraph,
}

impl From<SessionKind> for u8 {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Plain => 1,
            SessionKind::KnowledgeBase => 2,
            SessionKind::KnowledgeGraph => 3,
        }
    }
}

impl TryFrom<u8> for SessionKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SessionKind::Plain),
            2 => Ok(SessionKind::KnowledgeBase),
            3 => Ok(SessionKind::KnowledgeGraph),
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Plain => write!(f, "plain"),
            SessionKind::KnowledgeBase => write!(f, "knowledge-base"),
            SessionKind::KnowledgeGraph => write!(f, "knowledge-graph"),
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "1" => Ok(SessionKind::Plain),
            "kb" | "knowledge-base" | "2" => Ok(SessionKind::KnowledgeBase),
            "kg" | "knowledge-graph" | "3" => Ok(SessionKind::KnowledgeGraph),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_encoding() {
        assert_eq!(
            serde_json::to_value(SessionKind::KnowledgeGraph).unwrap(),
            json!(3)
        );
        let kind: SessionKind = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(kind, SessionKind::KnowledgeBase);
        assert!(serde_json::from_value::<SessionKind>(json!(9)).is_err());
    }

    #[test]
    fn parse_names() {
        assert_eq!("kb".parse::<SessionKind>().unwrap(), SessionKind::KnowledgeBase);
        assert_eq!("plain".parse::<SessionKind>().unwrap(), SessionKind::Plain);
        assert!("graphs".parse::<SessionKind>().is_err());
    }
}
