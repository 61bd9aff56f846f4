pub mod document;
pub mod error;
pub mod message;
pub mod message_group;
pub mod project;

pub use document::AttachedDocument;
pub use error::CoreError;
pub use message::{Message, Role};
pub use message_group::{group_messages_by_day, MessageGroup};
pub use project::{Project, ProjectState};
