//! ChatHandler: one request/response cycle per call.
//!
//! Validates input, appends the user message, assembles history, asks the
//! completion client for a reply, appends it, hands the conversation to the
//! persistence sync and returns. Turns on the same session are serialized by
//! a per-session lock; different sessions run in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use parley_types::conversation::{ConversationRecord, ConversationStats};
use parley_types::error::{ChatError, SyncError, ValidationError};
use parley_types::llm::CompletionRequest;
use parley_types::message::{Message, SessionId};

use crate::chat::state::TurnState;
use crate::history::HistoryAssembler;
use crate::llm::client::CompletionClient;
use crate::persistence::repository::ConversationRepository;
use crate::persistence::sync::PersistenceSync;
use crate::store::{MessageStore, SessionLocks};

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub session_id: SessionId,
    pub reply: String,
    /// Full conversation after the assistant reply was appended.
    pub conversation: Vec<Message>,
    /// States visited, in order.
    pub trace: Vec<TurnState>,
}

struct TurnTracker {
    state: TurnState,
    trace: Vec<TurnState>,
}

impl TurnTracker {
    fn new() -> Self {
        Self {
            state: TurnState::Received,
            trace: vec![TurnState::Received],
        }
    }

    fn advance(&mut self, to: TurnState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal turn transition {:?} -> {:?}",
            self.state,
            to
        );
        debug!(from = ?self.state, to = ?to, "Turn transition");
        self.state = to;
        self.trace.push(to);
    }
}

/// Orchestrates chat turns.
///
/// Generic over `CompletionClient` and `ConversationRepository`;
/// parley-core never depends on parley-infra.
pub struct ChatHandler<C: CompletionClient, R: ConversationRepository> {
    store: Arc<MessageStore>,
    locks: SessionLocks,
    history: HistoryAssembler,
    client: C,
    sync: Arc<PersistenceSync<R>>,
    model: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl<C: CompletionClient, R: ConversationRepository + 'static> ChatHandler<C, R> {
    pub fn new(
        store: Arc<MessageStore>,
        history: HistoryAssembler,
        client: C,
        sync: Arc<PersistenceSync<R>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            history,
            client,
            sync,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f64>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn sync(&self) -> &Arc<PersistenceSync<R>> {
        &self.sync
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one chat turn.
    ///
    /// On an upstream failure the user message stays in memory, nothing is
    /// appended for the assistant and nothing is synced.
    #[tracing::instrument(
        name = "chat_turn",
        skip(self, message, session_id),
        fields(session_id = session_id.unwrap_or_default())
    )]
    pub async fn handle(
        &self,
        message: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<ChatTurn, ChatError> {
        let mut turn = TurnTracker::new();

        let (message, session_id) = match validate(message, session_id) {
            Ok(valid) => valid,
            Err(e) => {
                turn.advance(TurnState::Failed);
                debug!(error = %e, "Rejected chat request");
                return Err(e.into());
            }
        };
        turn.advance(TurnState::Validated);

        let _guard = self.locks.lock(&session_id).await;

        self.store.append(&session_id, Message::user(message));
        turn.advance(TurnState::UserAppended);

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: self.history.assemble(&self.store.get(&session_id)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        turn.advance(TurnState::AwaitingCompletion);

        let response = match self.client.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                turn.advance(TurnState::Failed);
                warn!(
                    session_id = %session_id,
                    client = self.client.name(),
                    category = %e.category,
                    error = %e,
                    "Completion failed"
                );
                return Err(e.into());
            }
        };
        turn.advance(TurnState::Completed);

        self.store
            .append(&session_id, Message::assistant(response.content.clone()));
        turn.advance(TurnState::AssistantAppended);

        let conversation = self.store.get(&session_id);
        self.sync.spawn_sync(session_id.clone(), conversation.clone());
        turn.advance(TurnState::Persisted);

        turn.advance(TurnState::Responded);
        info!(
            session_id = %session_id,
            messages = conversation.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Chat turn completed"
        );

        Ok(ChatTurn {
            session_id,
            reply: response.content,
            conversation,
            trace: turn.trace,
        })
    }

    /// Read-through load of one conversation. Empty when unknown.
    pub async fn conversation(&self, session_id: &SessionId) -> Vec<Message> {
        let _guard = self.locks.lock(session_id).await;
        self.sync.load(session_id, &self.store).await
    }

    /// Forget a session in memory and, best-effort, in the external store.
    /// Idempotent.
    pub async fn clear(&self, session_id: &SessionId) {
        let guard = self.locks.lock(session_id).await;
        self.store.clear(session_id);
        match self.sync.delete(session_id).await {
            Ok(()) | Err(SyncError::Disabled) => {}
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "External delete failed; cleared in memory only");
            }
        }
        drop(guard);
        self.locks.release(session_id);
        info!(session_id = %session_id, "Conversation cleared");
    }

    /// Every in-memory conversation.
    pub fn list_all(&self) -> BTreeMap<String, Vec<Message>> {
        self.store.list_all()
    }

    pub async fn stats(&self, session_id: &SessionId) -> ConversationStats {
        ConversationStats::from_messages(&self.conversation(session_id).await)
    }

    /// Raw records from the external store.
    pub async fn raw_records(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationRecord>, SyncError> {
        self.sync.list_records(limit).await
    }

    /// Drop lock entries for sessions with no turn or sync in flight.
    pub fn prune_idle_locks(&self) {
        self.locks.prune_idle();
        self.sync.prune_idle();
    }

    /// Sessions holding a turn lock.
    pub fn locked_sessions(&self) -> usize {
        self.locks.len()
    }

    /// Wait for pending background syncs.
    pub async fn shutdown(&self) {
        self.sync.shutdown().await;
    }
}

fn validate<'a>(
    message: Option<&'a str>,
    session_id: Option<&str>,
) -> Result<(&'a str, SessionId), ValidationError> {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ValidationError::MissingMessage)?;
    let session_id = SessionId::parse(session_id.unwrap_or_default())?;
    Ok((message, session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use parley_types::error::{UpstreamCategory, UpstreamError};
    use parley_types::llm::{CompletionResponse, Usage};
    use parley_types::message::MessageRole;

    use crate::persistence::sync::tests::MockRepository;

    /// Replies from a script; an empty script echoes "ok".
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<String, UpstreamError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn replying(replies: &[&str]) -> Self {
            Self {
                script: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                ..Default::default()
            }
        }

        fn failing(error: UpstreamError) -> Self {
            Self {
                script: Mutex::new(VecDeque::from([Err(error)])),
                ..Default::default()
            }
        }
    }

    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, UpstreamError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.requests.lock().unwrap().push(request.clone());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()));
            next.map(|content| CompletionResponse {
                id: "resp-1".to_string(),
                content,
                model: request.model.clone(),
                usage: Usage::default(),
            })
        }
    }

    fn handler(
        client: ScriptedClient,
        repo: Option<MockRepository>,
    ) -> ChatHandler<ScriptedClient, MockRepository> {
        let sync = Arc::new(PersistenceSync::new(repo, Duration::from_millis(200)));
        ChatHandler::new(
            Arc::new(MessageStore::new()),
            HistoryAssembler::default(),
            client,
            sync,
            "gpt-3.5-turbo",
        )
    }

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn first_turn_returns_reply_and_conversation() {
        let h = handler(ScriptedClient::replying(&["Hi"]), Some(MockRepository::default()));

        let turn = h.handle(Some("Hello"), Some("s1")).await.unwrap();
        assert_eq!(turn.reply, "Hi");
        assert_eq!(turn.conversation.len(), 2);
        assert_eq!(turn.conversation[0].role, MessageRole::User);
        assert_eq!(turn.conversation[0].content, "Hello");
        assert_eq!(turn.conversation[1].role, MessageRole::Assistant);
        assert_eq!(turn.trace.first(), Some(&TurnState::Received));
        assert_eq!(turn.trace.last(), Some(&TurnState::Responded));

        h.sync().flush().await;
        let records = h.raw_records(None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn prompt_carries_system_prompt_and_history() {
        let h = handler(ScriptedClient::replying(&["Hi", "Fine"]), None);
        h.handle(Some("Hello"), Some("s1")).await.unwrap();
        h.handle(Some("How are you?"), Some("s1")).await.unwrap();

        let requests = h.client.requests.lock().unwrap();
        let last = requests.last().unwrap();
        assert_eq!(last.model, "gpt-3.5-turbo");
        assert_eq!(last.messages.len(), 4);
        assert_eq!(last.messages[0].role, MessageRole::System);
        assert_eq!(last.messages[3].content, "How are you?");
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_without_side_effects() {
        let h = handler(ScriptedClient::default(), None);

        let err = h.handle(None, Some("s1")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ValidationError::MissingMessage)));

        let err = h.handle(Some("   "), Some("s1")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ValidationError::MissingMessage)));

        let err = h.handle(Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ValidationError::MissingSessionId)));

        let err = h.handle(Some("hi"), Some("")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ValidationError::MissingSessionId)));

        assert_eq!(h.store().session_count(), 0);
        assert!(h.client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_keeps_user_message_and_skips_sync() {
        let h = handler(
            ScriptedClient::failing(UpstreamError::from_status(401, "bad key")),
            Some(MockRepository::default()),
        );

        let err = h.handle(Some("Hello"), Some("s1")).await.unwrap_err();
        let ChatError::Upstream(upstream) = err else {
            panic!("expected upstream error");
        };
        assert_eq!(upstream.category, UpstreamCategory::Auth);
        assert_eq!(
            upstream.user_message(),
            "OpenAI API key is invalid. Please check your configuration."
        );

        let conversation = h.store().get(&sid("s1"));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, MessageRole::User);

        h.sync().flush().await;
        assert!(h.raw_records(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_has_distinct_message() {
        let h = handler(
            ScriptedClient::failing(UpstreamError::from_status(429, "slow down")),
            None,
        );
        let err = h.handle(Some("Hello"), Some("s1")).await.unwrap_err();
        let ChatError::Upstream(upstream) = err else {
            panic!("expected upstream error");
        };
        assert_eq!(upstream.category, UpstreamCategory::RateLimit);
        assert_eq!(
            upstream.user_message(),
            "Rate limit exceeded. Please wait a moment and try again."
        );
    }

    #[tokio::test]
    async fn store_outage_still_returns_reply() {
        let h = handler(ScriptedClient::replying(&["Hi"]), Some(MockRepository::offline()));
        let turn = h.handle(Some("Hello"), Some("s1")).await.unwrap();
        assert_eq!(turn.reply, "Hi");

        h.sync().flush().await;
        assert_eq!(h.store().len(&sid("s1")), 2);
    }

    #[tokio::test]
    async fn unknown_session_with_unreachable_store_is_empty() {
        let h = handler(ScriptedClient::default(), Some(MockRepository::offline()));
        assert!(h.conversation(&sid("unknown-session")).await.is_empty());
        assert_eq!(h.stats(&sid("unknown-session")).await.total_messages, 0);
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_removes_external_record() {
        let h = handler(ScriptedClient::replying(&["Hi"]), Some(MockRepository::default()));
        let s = sid("s1");
        h.handle(Some("Hello"), Some("s1")).await.unwrap();
        h.sync().flush().await;

        h.clear(&s).await;
        h.clear(&s).await;

        assert!(h.store().get(&s).is_empty());
        assert!(h.raw_records(None).await.unwrap().is_empty());
        assert!(h.conversation(&s).await.is_empty());
    }

    #[tokio::test]
    async fn clearing_unknown_sessions_does_not_accumulate_locks() {
        let h = handler(ScriptedClient::default(), Some(MockRepository::default()));
        for i in 0..200 {
            h.clear(&sid(&format!("random-{i}"))).await;
        }
        h.sync().flush().await;
        assert_eq!(h.locked_sessions(), 0);
        assert_eq!(h.sync().tracked_sessions(), (0, 0));

        h.handle(Some("Hello"), Some("s1")).await.unwrap();
        h.sync().flush().await;
        h.prune_idle_locks();
        assert_eq!(h.locked_sessions(), 0);
        assert_eq!(h.sync().tracked_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn clear_with_store_outage_still_clears_memory() {
        let h = handler(ScriptedClient::replying(&["Hi"]), Some(MockRepository::default()));
        let s = sid("s1");
        h.handle(Some("Hello"), Some("s1")).await.unwrap();
        h.sync().flush().await;

        h.sync()
            .repo_for_tests()
            .offline
            .store(true, Ordering::SeqCst);
        h.clear(&s).await;
        assert!(h.store().get(&s).is_empty());
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_alternate() {
        let client = ScriptedClient {
            delay: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        let h = handler(client, None);

        let (a, b) = tokio::join!(
            h.handle(Some("first"), Some("s1")),
            h.handle(Some("second"), Some("s1")),
        );
        a.unwrap();
        b.unwrap();

        let roles: Vec<MessageRole> = h.store().get(&sid("s1")).iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let h = handler(ScriptedClient::default(), None);
        h.handle(Some("a"), Some("s1")).await.unwrap();
        h.handle(Some("b"), Some("s2")).await.unwrap();

        let all = h.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all["s1"][0].content, "a");
        assert_eq!(all["s2"][0].content, "b");
    }
}
