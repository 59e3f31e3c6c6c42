//! BoxConversationRepository -- object-safe wrapper for ConversationRepository.
//!
//! Same blanket-impl pattern as `BoxCompletionClient`.

use std::future::Future;
use std::pin::Pin;

use parley_types::conversation::ConversationRecord;
use parley_types::error::RepositoryError;
use parley_types::message::Message;

use super::repository::ConversationRepository;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`ConversationRepository`] with boxed futures.
pub trait ConversationRepositoryDyn: Send + Sync {
    fn name(&self) -> &str;

    fn find_boxed<'a>(&'a self, conversation_id: &'a str)
    -> BoxFuture<'a, Option<ConversationRecord>>;

    fn insert_boxed<'a>(&'a self, record: &'a ConversationRecord) -> BoxFuture<'a, ()>;

    fn update_messages_boxed<'a>(
        &'a self,
        conversation_id: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, ()>;

    fn delete_boxed<'a>(&'a self, conversation_id: &'a str) -> BoxFuture<'a, ()>;

    fn list_boxed(&self, limit: Option<i64>) -> BoxFuture<'_, Vec<ConversationRecord>>;
}

impl<T: ConversationRepository> ConversationRepositoryDyn for T {
    fn name(&self) -> &str {
        ConversationRepository::name(self)
    }

    fn find_boxed<'a>(
        &'a self,
        conversation_id: &'a str,
    ) -> BoxFuture<'a, Option<ConversationRecord>> {
        Box::pin(self.find(conversation_id))
    }

    fn insert_boxed<'a>(&'a self, record: &'a ConversationRecord) -> BoxFuture<'a, ()> {
        Box::pin(self.insert(record))
    }

    fn update_messages_boxed<'a>(
        &'a self,
        conversation_id: &'a str,
        messages: &'a [Message],
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.update_messages(conversation_id, messages))
    }

    fn delete_boxed<'a>(&'a self, conversation_id: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(self.delete(conversation_id))
    }

    fn list_boxed(&self, limit: Option<i64>) -> BoxFuture<'_, Vec<ConversationRecord>> {
        Box::pin(self.list(limit))
    }
}

/// Type-erased conversation repository, chosen at startup from configuration.
pub struct BoxConversationRepository {
    inner: Box<dyn ConversationRepositoryDyn>,
}

impl BoxConversationRepository {
    pub fn new<T: ConversationRepository + 'static>(repo: T) -> Self {
        Self {
            inner: Box::new(repo),
        }
    }
}

impl ConversationRepository for BoxConversationRepository {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        self.inner.find_boxed(conversation_id).await
    }

    async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        self.inner.insert_boxed(record).await
    }

    async fn update_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), RepositoryError> {
        self.inner
            .update_messages_boxed(conversation_id, messages)
            .await
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_boxed(conversation_id).await
    }

    async fn list(&self, limit: Option<i64>) -> Result<Vec<ConversationRecord>, RepositoryError> {
        self.inner.list_boxed(limit).await
    }
}
