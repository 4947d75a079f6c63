use serde::{Deserialize, Serialize};

/// Descriptor of a file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name as chosen by the user.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Media type, when known.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl FileInfo {
    /// Create a new `FileInfo`.
    pub fn new(name: impl Into<String>, size: u64, media_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            size,
            media_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_type_uses_type_key() {
        let info = FileInfo::new("notes.pdf", 2048, Some("application/pdf".to_string()));
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"name": "notes.pdf", "size": 2048, "type": "application/pdf"})
        );
    }

    #[test]
    fn media_type_optional() {
        let info: FileInfo = serde_json::from_value(json!({"name": "a", "size": 1})).unwrap();
        assert_eq!(info.media_type, None);
    }
}
