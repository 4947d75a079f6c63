// Public modules
pub mod attachment;
pub mod chat_delta;
pub mod file_info;
pub mod message_create;
pub mod server_message;
pub mod session_id;
pub mod session_kind;
pub mod session_record;
pub mod source_info;

// Re-exports
pub use attachment::Attachment;
pub use chat_delta::{ChatDelta, DeltaChoice, DeltaContent};
pub use file_info::FileInfo;
pub use message_create::MessageCreate;
pub use server_message::ServerMessage;
pub use session_id::SessionId;
pub use session_kind::SessionKind;
pub use session_record::{SessionDetail, SessionRecord};
pub use source_info::SourceInfo;
