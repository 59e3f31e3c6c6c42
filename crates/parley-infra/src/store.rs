//! External store selection.
//!
//! Turns [`StoreSettings`] into an optional boxed repository. `None` means
//! memory-only mode, which is also what missing Supabase credentials fall
//! back to.

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

use parley_core::persistence::box_repository::BoxConversationRepository;
use parley_types::config::{StoreBackend, StoreSettings};

use crate::sqlite::conversation::SqliteConversationRepository;
use crate::sqlite::pool::{DEFAULT_DATABASE_URL, DatabasePool};
use crate::supabase::SupabaseConversationRepository;

#[derive(Debug, Error)]
pub enum StoreInitError {
    #[error("failed to open sqlite database: {0}")]
    Sqlite(#[from] sqlx::Error),
}

/// Build the repository for the configured backend.
pub async fn open_repository(
    settings: &StoreSettings,
) -> Result<Option<BoxConversationRepository>, StoreInitError> {
    match settings.resolved_backend() {
        StoreBackend::Memory => {
            info!("No external store configured; conversations are memory-only");
            Ok(None)
        }
        StoreBackend::Supabase => {
            let (Some(url), Some(key)) = (
                settings.supabase_url.as_deref().filter(|s| !s.trim().is_empty()),
                settings.supabase_key.as_deref().filter(|s| !s.trim().is_empty()),
            ) else {
                warn!("Supabase store selected but SUPABASE_URL / SUPABASE_KEY are not set; conversations are memory-only");
                return Ok(None);
            };
            info!(url, table = %settings.table, "Using Supabase conversation store");
            let repo = SupabaseConversationRepository::new(
                url,
                SecretString::from(key.to_string()),
                settings.table.clone(),
            );
            Ok(Some(BoxConversationRepository::new(repo)))
        }
        StoreBackend::Sqlite => {
            let url = settings
                .database_url
                .as_deref()
                .unwrap_or(DEFAULT_DATABASE_URL);
            let pool = DatabasePool::connect(url).await?;
            info!(url, "Using SQLite conversation store");
            Ok(Some(BoxConversationRepository::new(
                SqliteConversationRepository::new(pool),
            )))
        }
    }
}
