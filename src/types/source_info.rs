use serde::{Deserialize, Serialize};

/// A web source cited by an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Page title, if the search result had one.
    #[serde(default)]
    pub title: Option<String>,
    /// Location of the source.
    pub url: String,
    /// Search-result excerpt.
    #[serde(default)]
    pub snippet: Option<String>,
}
