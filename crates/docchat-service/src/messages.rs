use std::sync::Arc;

use bytes::Bytes;
use chrono::Local;
use docchat_core::{group_messages_by_day, Message, MessageGroup, Role};
use docchat_store::{messages_key, KeyValueStore, MESSAGES_KEY_PREFIX};

use crate::ServiceError;

/// Conversation history for one project at a time, persisted as a JSON
/// array under `messages_{project_id}`.
///
/// Every mutation rewrites the whole list and recomputes the day groups.
pub struct MessageService {
    store: Arc<dyn KeyValueStore>,
    project_id: Option<String>,
    messages: Vec<Message>,
    groups: Vec<MessageGroup>,
}

impl MessageService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            project_id: None,
            messages: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn current_project(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn groups(&self) -> &[MessageGroup] {
        &self.groups
    }

    /// Make `project_id` the current project and read its history.
    ///
    /// A stored list that fails to parse is logged and replaced by an
    /// empty one; only store I/O failures are returned.
    pub async fn load(&mut self, project_id: &str) -> Result<(), ServiceError> {
        let key = messages_key(project_id);
        let messages = match self.store.get_opt(&key).await? {
            Some(raw) => decode_messages(&key, &raw).unwrap_or_default(),
            None => Vec::new(),
        };
        tracing::debug!(project_id, count = messages.len(), "loaded messages");
        self.project_id = Some(project_id.to_string());
        self.messages = messages;
        self.refresh_groups();
        Ok(())
    }

    pub async fn add_user_message(&mut self, content: &str) -> Result<Message, ServiceError> {
        self.add_message(Role::User, content).await
    }

    pub async fn add_assistant_message(&mut self, content: &str) -> Result<Message, ServiceError> {
        self.add_message(Role::Assistant, content).await
    }

    pub async fn add_system_message(&mut self, content: &str) -> Result<Message, ServiceError> {
        self.add_message(Role::System, content).await
    }

    async fn add_message(&mut self, role: Role, content: &str) -> Result<Message, ServiceError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(ServiceError::NoActiveProject)?;
        let message = Message::new(project_id, role, content);
        let mut next = self.messages.clone();
        next.push(message.clone());
        self.save(&next).await?;
        self.commit(next);
        Ok(message)
    }

    /// Up to `limit` user messages across every stored project, newest first.
    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<Message>, ServiceError> {
        let mut recent = Vec::new();
        for key in self.store.list(MESSAGES_KEY_PREFIX).await? {
            let Some(raw) = self.store.get_opt(&key).await? else {
                continue;
            };
            let Some(messages) = decode_messages(&key, &raw) else {
                continue;
            };
            recent.extend(messages.into_iter().filter(|m| m.role == Role::User));
        }
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        Ok(recent)
    }

    /// Remove a message. Returns whether anything was removed; unknown ids
    /// leave the stored list untouched.
    pub async fn delete_message(&mut self, message_id: &str) -> Result<bool, ServiceError> {
        if !self.messages.iter().any(|m| m.id == message_id) {
            return Ok(false);
        }
        let next: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.id != message_id)
            .cloned()
            .collect();
        self.save(&next).await?;
        self.commit(next);
        Ok(true)
    }

    pub async fn mark_message_as_read(&mut self, message_id: &str) -> Result<bool, ServiceError> {
        let Some(pos) = self.messages.iter().position(|m| m.id == message_id) else {
            return Ok(false);
        };
        let mut next = self.messages.clone();
        next[pos].is_read = Some(true);
        self.save(&next).await?;
        self.commit(next);
        Ok(true)
    }

    /// Drop the current project's history, in memory and in the store.
    pub async fn clear(&mut self) -> Result<(), ServiceError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(ServiceError::NoActiveProject)?;
        self.store.delete(&messages_key(project_id)).await?;
        self.messages.clear();
        self.refresh_groups();
        Ok(())
    }

    /// Write `messages` as the current project's history. `self` is only
    /// updated through `commit` once the write has succeeded.
    async fn save(&self, messages: &[Message]) -> Result<(), ServiceError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or(ServiceError::NoActiveProject)?;
        let json = serde_json::to_vec(messages)?;
        self.store
            .put(&messages_key(project_id), Bytes::from(json))
            .await?;
        tracing::debug!(project_id, count = messages.len(), "saved messages");
        Ok(())
    }

    fn commit(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.refresh_groups();
    }

    fn refresh_groups(&mut self) {
        self.groups = group_messages_by_day(&self.messages, &Local::now());
    }
}

fn decode_messages(key: &str, raw: &[u8]) -> Option<Vec<Message>> {
    match serde_json::from_slice::<Vec<Message>>(raw) {
        Ok(messages) => Some(messages),
        Err(e) => {
            tracing::error!(key, error = %e, "failed to parse stored messages");
            None
        }
    }
}
