//! Process-local conversation state.
//!
//! [`MessageStore`] maps a session id to its ordered message list. Each
//! operation is atomic on its own (the map is sharded and locked per entry),
//! but a chat turn is a read-modify-write spanning an await on the completion
//! API, so callers serialize whole turns per session with [`SessionLocks`].

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use parley_types::conversation::ConversationStats;
use parley_types::message::{Message, SessionId};

/// In-memory conversations keyed by session id.
///
/// Unbounded: nothing is evicted until the session is cleared or the process
/// exits.
#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: DashMap<String, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, creating the conversation if it does not exist.
    pub fn append(&self, session_id: &SessionId, message: Message) {
        self.conversations
            .entry(session_id.as_str().to_string())
            .or_default()
            .push(message);
    }

    /// Messages for a session in insertion order. Empty if unknown.
    pub fn get(&self, session_id: &SessionId) -> Vec<Message> {
        self.conversations
            .get(session_id.as_str())
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Drop a session. Unknown sessions are a no-op.
    pub fn clear(&self, session_id: &SessionId) {
        self.conversations.remove(session_id.as_str());
    }

    /// Replace a session's messages wholesale (read-through from the store).
    pub fn replace(&self, session_id: &SessionId, messages: Vec<Message>) {
        self.conversations
            .insert(session_id.as_str().to_string(), messages);
    }

    /// Snapshot of every conversation, ordered by session id.
    pub fn list_all(&self) -> BTreeMap<String, Vec<Message>> {
        self.conversations
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self, session_id: &SessionId) -> usize {
        self.conversations
            .get(session_id.as_str())
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn stats(&self, session_id: &SessionId) -> ConversationStats {
        self.conversations
            .get(session_id.as_str())
            .map(|c| ConversationStats::from_messages(c.value()))
            .unwrap_or_default()
    }
}

/// Per-session async mutexes.
///
/// `tokio::sync::Mutex` is FIFO-fair, so turns on one session run in arrival
/// order. Different sessions never contend.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a session.
    pub async fn lock(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self
            .locks
            .entry(session_id.as_str().to_string())
            .or_default()
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Forget one session's mutex if nobody holds or waits on it.
    pub fn release(&self, session_id: &SessionId) {
        self.locks
            .remove_if(session_id.as_str(), |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Forget mutexes nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
