use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Previews longer than this many characters are truncated.
pub const PREVIEW_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub const ALL: &[Role] = &[Role::User, Role::Assistant, Role::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(CoreError::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// One turn of a project conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl Message {
    /// Build a message stamped with a fresh id and the current time.
    /// Only user messages carry a preview.
    pub fn new(project_id: &str, role: Role, content: &str) -> Self {
        Self::at(project_id, role, content, Utc::now())
    }

    pub fn at(project_id: &str, role: Role, content: &str, timestamp: DateTime<Utc>) -> Self {
        let preview = match role {
            Role::User => Some(message_preview(content, PREVIEW_MAX_CHARS)),
            _ => None,
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            role,
            timestamp,
            project_id: project_id.to_string(),
            is_read: None,
            reaction_type: None,
            preview,
        }
    }

    pub fn is_read(&self) -> bool {
        self.is_read.unwrap_or(false)
    }
}

/// Shorten `content` to at most `max_chars` characters, appending `...`
/// when anything was cut.
pub fn message_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((cut, _)) => format!("{}...", &content[..cut]),
    }
}
