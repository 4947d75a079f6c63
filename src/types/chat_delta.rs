use serde::{Deserialize, Serialize};

/// The delta envelope carried by every data frame of a reply stream.
///
/// Only the first choice is consulted; every field is optional on the wire, and a missing
/// field reads as "no text in this frame".  A payload that is not a JSON object at all does
/// not decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Upstream identifier of the completion, when forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Incremental choices.
    #[serde(default)]
    pub choices: Vec<DeltaChoice>,
}

/// One choice of a [`ChatDelta`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental content.
    #[serde(default)]
    pub delta: DeltaContent,

    /// Set on the last frame of the choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental content of a [`DeltaChoice`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaContent {
    /// Role, only present on the first frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatDelta {
    /// Build a delta carrying a single text fragment.
    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            id: None,
            choices: vec![DeltaChoice {
                index: 0,
                delta: DeltaContent {
                    role: None,
                    content: Some(fragment.into()),
                },
                finish_reason: None,
            }],
        }
    }

    /// The text fragment of the first choice, or `""` when absent.
    pub fn fragment(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }

    /// The finish reason of the first choice, if this frame ends it.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fragment_of_openai_style_frame() {
        let delta: ChatDelta = serde_json::from_value(json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
        }))
        .unwrap();
        assert_eq!(delta.fragment(), "Hel");
        assert_eq!(delta.finish_reason(), None);
    }

    #[test]
    fn missing_fields_give_empty_fragment() {
        for value in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{}]}),
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            json!({"choices": [{"delta": {"content": null}}]}),
        ] {
            let delta: ChatDelta = serde_json::from_value(value).unwrap();
            assert_eq!(delta.fragment(), "");
        }
    }

    #[test]
    fn non_object_payload_does_not_decode() {
        assert!(serde_json::from_str::<ChatDelta>("\"just text\"").is_err());
        assert!(serde_json::from_str::<ChatDelta>("42").is_err());
    }

    #[test]
    fn finish_reason() {
        let delta: ChatDelta = serde_json::from_value(json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(delta.finish_reason(), Some("stop"));
    }
}
