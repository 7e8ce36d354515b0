//! Ordered, deduplicated message list for one conversation

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::Message;

/// Messages of one conversation in thread order, at most one entry per id
#[derive(Debug, Clone, Default)]
pub struct MessageThread {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a history batch; sorts by (created_at, id) and drops repeated ids
    pub fn from_history(mut history: Vec<Message>) -> Self {
        history.sort_by(Message::thread_order);

        let mut thread = Self::new();
        for message in history {
            thread.append(message);
        }
        thread
    }

    /// Append at the tail unless a message with the same id is already present
    ///
    /// Returns `false` for a duplicate; the list is left untouched in that case.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Ids of messages addressed to `viewer_id` that have no read timestamp
    pub fn unread_ids_for(&self, viewer_id: &str) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.is_unread_for(viewer_id))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Stamp `read_at` on the listed messages that are still unread
    pub fn mark_read(&mut self, ids: &[String], at: DateTime<Utc>) -> usize {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.messages
            .iter_mut()
            .filter(|m| targets.contains(m.id.as_str()))
            .map(|m| m.mark_read(at))
            .filter(|changed| *changed)
            .count()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
