//! ConversationRepository trait definition.
//!
//! One record per session, holding the full message list as a JSON array.
//! Follows the same RPITIT pattern as `CompletionClient`.

use parley_types::conversation::ConversationRecord;
use parley_types::error::RepositoryError;
use parley_types::message::Message;

/// Repository trait for whole-conversation persistence.
///
/// Implementations live in parley-infra (e.g., `SupabaseConversationRepository`,
/// `SqliteConversationRepository`).
pub trait ConversationRepository: Send + Sync {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Fetch the record for a session, if one exists.
    fn find(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationRecord>, RepositoryError>> + Send;

    /// Insert a new record. Fails with `Conflict` if the id already exists.
    fn insert(
        &self,
        record: &ConversationRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite the message list of an existing record.
    fn update_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent records first.
    fn list(
        &self,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationRecord>, RepositoryError>> + Send;
}
