use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(SessionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_value(SessionId(42)).unwrap(), json!(42));
        let id: SessionId = serde_json::from_value(json!(9)).unwrap();
        assert_eq!(id, SessionId(9));
    }

    #[test]
    fn from_str() {
        assert_eq!(" 12 ".parse::<SessionId>().unwrap(), SessionId(12));
        assert!("abc".parse::<SessionId>().is_err());
    }
}
