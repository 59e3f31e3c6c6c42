//! Persisted conversation records and per-session statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageRole};

/// One row in the external `conversations` table.
///
/// `id` and `created_at` are assigned by the store, so they are absent on
/// records that have not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub conversation_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// A record that has not been stored yet.
    pub fn new(conversation_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: None,
            conversation_id: conversation_id.into(),
            messages,
            created_at: None,
        }
    }
}

/// Message counts for one conversation, broken down by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub system_messages: usize,
}

impl ConversationStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        messages.iter().fold(Self::default(), |mut stats, m| {
            stats.total_messages += 1;
            match m.role {
                MessageRole::User => stats.user_messages += 1,
                MessageRole::Assistant => stats.assistant_messages += 1,
                MessageRole::System => stats.system_messages += 1,
            }
            stats
        })
    }
}
