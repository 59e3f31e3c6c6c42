//! Application state wiring the chat handler to its concrete backends.
//!
//! The handler is generic over the completion client and repository traits;
//! AppState pins it to the boxed implementations chosen from settings at
//! startup.

use std::sync::Arc;
use std::time::Duration;

use parley_core::chat::ChatHandler;
use parley_core::history::HistoryAssembler;
use parley_core::llm::box_client::BoxCompletionClient;
use parley_core::persistence::box_repository::BoxConversationRepository;
use parley_core::persistence::sync::PersistenceSync;
use parley_core::store::MessageStore;
use parley_infra::llm::create_client;
use parley_infra::store::open_repository;
use parley_types::config::Settings;

pub type ConcreteChatHandler = ChatHandler<BoxCompletionClient, BoxConversationRepository>;

/// Shared state for HTTP handlers and CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ConcreteChatHandler>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build the completion client and open the configured store.
    pub async fn init(settings: Settings) -> anyhow::Result<Self> {
        let client = create_client(&settings.completion)?;
        let repo = open_repository(&settings.store).await?;
        Ok(Self::from_parts(settings, client, repo))
    }

    pub fn from_parts(
        settings: Settings,
        client: BoxCompletionClient,
        repo: Option<BoxConversationRepository>,
    ) -> Self {
        let sync = Arc::new(PersistenceSync::new(
            repo,
            Duration::from_millis(settings.store.timeout_ms),
        ));
        let chat = ChatHandler::new(
            Arc::new(MessageStore::new()),
            HistoryAssembler::new(settings.completion.system_prompt.clone()),
            client,
            sync,
            settings.completion.model.clone(),
        )
        .with_sampling(settings.completion.temperature, settings.completion.max_tokens);

        Self {
            chat: Arc::new(chat),
            settings: Arc::new(settings),
        }
    }
}
