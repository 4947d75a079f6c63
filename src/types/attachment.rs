use std::path::Path;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::FileInfo;

/// An opaque file handed to the multipart upload path.
///
/// The payload is never inspected; `info` travels with the optimistic user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Name, size and media type.
    pub info: FileInfo,
    /// Raw file content.
    pub data: Bytes,
}

impl Attachment {
    /// Wraps bytes with their descriptor; the size is taken from the payload.
    pub fn new(
        name: impl Into<String>,
        media_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            info: FileInfo::new(name, data.len() as u64, media_type),
            data,
        }
    }

    /// Reads a file from disk, naming it after the last path component.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("cannot read {}", path.display()), err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = media_type_for(&name).map(str::to_string);
        Ok(Self::new(name, media_type, data))
    }
}

/// Guesses a media type from a file extension.
pub fn media_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "pdf" => Some("application/pdf"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_comes_from_payload() {
        let attachment = Attachment::new("a.txt", None, &b"hello"[..]);
        assert_eq!(attachment.info.size, 5);
        assert_eq!(attachment.info.name, "a.txt");
    }

    #[test]
    fn media_types_by_extension() {
        assert_eq!(media_type_for("Report.PDF"), Some("application/pdf"));
        assert_eq!(media_type_for("notes.md"), Some("text/markdown"));
        assert_eq!(media_type_for("archive.tar.zst"), None);
        assert_eq!(media_type_for("Makefile"), None);
    }

    #[tokio::test]
    async fn read_names_file_and_guesses_type() {
        let path = std::env::temp_dir().join(format!("chatsync-{}.csv", std::process::id()));
        tokio::fs::write(&path, "a,b\n1,2\n").await.unwrap();
        let attachment = Attachment::read(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(attachment.info.size, 8);
        assert_eq!(attachment.info.media_type.as_deref(), Some("text/csv"));
        assert!(attachment.info.name.starts_with("chatsync-"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = Attachment::read("/nonexistent/chatsync/missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("missing.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
