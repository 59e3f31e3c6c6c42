//! Best-effort synchronization of conversations to an external store.
//!
//! Policy:
//! - Each turn overwrites the full message list (last write wins). The record
//!   is read first; present -> update, absent -> insert.
//! - Every store call is bounded by a timeout. Failures are returned as
//!   [`SyncError`] and, for background syncs, only logged.
//! - Background writes for one session are serialized, and a snapshot that is
//!   older than what was already written (shorter list, or taken before the
//!   session was cleared) is dropped as [`SyncOutcome::Stale`].
//! - Per-session bookkeeping only lives while a sync for that session is in
//!   flight.
//! - Loading reads the store first and falls back to memory on any failure.
//!
//! Nothing is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use parley_types::conversation::ConversationRecord;
use parley_types::error::{RepositoryError, SyncError};
use parley_types::message::{Message, SessionId};

use crate::persistence::repository::ConversationRepository;
use crate::store::{MessageStore, SessionLocks};

/// Result of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted,
    Updated,
    /// No external store configured.
    Disabled,
    /// A newer snapshot was already written, or the session was cleared.
    Stale,
}

/// Per-session write bookkeeping.
///
/// Removed once `inflight` drops to zero. Generation and length only order
/// snapshots against each other, so with nothing in flight there is nothing
/// to order.
#[derive(Debug, Clone, Copy, Default)]
struct SyncMark {
    generation: u64,
    written_len: usize,
    inflight: usize,
}

/// Applies the best-effort persistence policy on top of a repository.
///
/// The repository is optional: without one every operation degrades to
/// memory-only behaviour.
pub struct PersistenceSync<R: ConversationRepository> {
    repo: Option<Arc<R>>,
    timeout: Duration,
    marks: DashMap<String, SyncMark>,
    write_locks: SessionLocks,
    tracker: TaskTracker,
}

impl<R: ConversationRepository + 'static> PersistenceSync<R> {
    pub fn new(repo: Option<R>, timeout: Duration) -> Self {
        Self {
            repo: repo.map(Arc::new),
            timeout,
            marks: DashMap::new(),
            write_locks: SessionLocks::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Memory-only mode.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    pub fn is_enabled(&self) -> bool {
        self.repo.is_some()
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.repo.as_deref().map(|r| r.name())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Background syncs still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    #[cfg(test)]
    pub(crate) fn repo_for_tests(&self) -> &R {
        self.repo.as_deref().expect("repository configured")
    }

    /// Register a snapshot for `session_id` and return its generation.
    /// Every call must be paired with [`Self::finish`].
    fn begin(&self, session_id: &SessionId) -> u64 {
        let mut mark = self.marks.entry(session_id.as_str().to_string()).or_default();
        mark.inflight += 1;
        mark.generation
    }

    fn finish(&self, session_id: &SessionId) {
        if let Some(mut mark) = self.marks.get_mut(session_id.as_str()) {
            mark.inflight = mark.inflight.saturating_sub(1);
        }
        self.marks
            .remove_if(session_id.as_str(), |_, mark| mark.inflight == 0);
    }

    /// Write the full message list for a session now.
    pub async fn sync(
        &self,
        session_id: &SessionId,
        messages: &[Message],
    ) -> Result<SyncOutcome, SyncError> {
        let generation = self.begin(session_id);
        let result = self.sync_at(session_id, messages, generation).await;
        self.finish(session_id);
        result.inspect_err(|e| {
            warn!(session_id = %session_id, error = %e, "Conversation sync failed");
        })
    }

    /// Sync in a tracked background task. The caller does not wait; the
    /// result is only logged.
    ///
    /// The snapshot's generation is captured here, before the task runs, so a
    /// clear that happens afterwards turns this write into a no-op.
    pub fn spawn_sync(self: &Arc<Self>, session_id: SessionId, messages: Vec<Message>) {
        if !self.is_enabled() {
            return;
        }
        let generation = self.begin(&session_id);
        let this = Arc::clone(self);
        self.tracker.spawn(async move {
            let result = this.sync_at(&session_id, &messages, generation).await;
            this.finish(&session_id);
            match result {
                Ok(outcome) => {
                    debug!(session_id = %session_id, ?outcome, messages = messages.len(), "Conversation synced");
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Conversation sync failed; continuing with in-memory copy");
                }
            }
        });
    }

    async fn sync_at(
        &self,
        session_id: &SessionId,
        messages: &[Message],
        generation: u64,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(repo) = self.repo.as_deref() else {
            return Ok(SyncOutcome::Disabled);
        };

        let guard = self.write_locks.lock(session_id).await;
        let result = self.write_locked(repo, session_id, messages, generation).await;
        drop(guard);
        self.write_locks.release(session_id);
        result
    }

    async fn write_locked(
        &self,
        repo: &R,
        session_id: &SessionId,
        messages: &[Message],
        generation: u64,
    ) -> Result<SyncOutcome, SyncError> {
        let mark = self
            .marks
            .get(session_id.as_str())
            .map(|m| *m)
            .unwrap_or_default();
        if generation != mark.generation || messages.len() < mark.written_len {
            return Ok(SyncOutcome::Stale);
        }

        let id = session_id.as_str();
        let existing = self.bounded("read", repo.find(id), SyncError::Read).await?;

        let outcome = match existing {
            Some(_) => {
                self.bounded("update", repo.update_messages(id, messages), SyncError::Write)
                    .await?;
                SyncOutcome::Updated
            }
            None => {
                let record = ConversationRecord::new(id, messages.to_vec());
                self.bounded("insert", repo.insert(&record), SyncError::Write)
                    .await?;
                SyncOutcome::Inserted
            }
        };

        if let Some(mut mark) = self.marks.get_mut(id) {
            mark.written_len = messages.len();
        }
        Ok(outcome)
    }

    /// Read-through load.
    ///
    /// A reachable store with a record at least as long as the in-memory copy
    /// wins and replaces it. A shorter record means a sync is still pending,
    /// so memory is kept. Any failure, timeout, or missing record falls back
    /// to memory (possibly empty). Never fails.
    pub async fn load(&self, session_id: &SessionId, store: &MessageStore) -> Vec<Message> {
        let Some(repo) = self.repo.as_deref() else {
            return store.get(session_id);
        };

        match self
            .bounded("read", repo.find(session_id.as_str()), SyncError::Read)
            .await
        {
            Ok(Some(record)) if record.messages.len() >= store.len(session_id) => {
                store.replace(session_id, record.messages.clone());
                record.messages
            }
            Ok(Some(record)) => {
                debug!(
                    session_id = %session_id,
                    stored = record.messages.len(),
                    in_memory = store.len(session_id),
                    "External copy is behind memory; serving memory"
                );
                store.get(session_id)
            }
            Ok(None) => store.get(session_id),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Conversation load failed; serving memory");
                store.get(session_id)
            }
        }
    }

    /// Remove the external record and invalidate pending background writes.
    pub async fn delete(&self, session_id: &SessionId) -> Result<(), SyncError> {
        let guard = self.write_locks.lock(session_id).await;
        if let Some(mut mark) = self.marks.get_mut(session_id.as_str()) {
            mark.generation += 1;
            mark.written_len = 0;
        }

        let result = match self.repo.as_deref() {
            Some(repo) => {
                self.bounded("delete", repo.delete(session_id.as_str()), SyncError::Delete)
                    .await
            }
            None => Err(SyncError::Disabled),
        };
        drop(guard);
        self.write_locks.release(session_id);
        result
    }

    /// Drop write locks nobody holds and marks with nothing in flight.
    pub fn prune_idle(&self) {
        self.write_locks.prune_idle();
        self.marks.retain(|_, mark| mark.inflight > 0);
    }

    /// Sessions with sync bookkeeping, as (marks, write locks).
    pub fn tracked_sessions(&self) -> (usize, usize) {
        (self.marks.len(), self.write_locks.len())
    }

    /// Raw external records, most recent first.
    pub async fn list_records(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationRecord>, SyncError> {
        let Some(repo) = self.repo.as_deref() else {
            return Err(SyncError::Disabled);
        };
        self.bounded("list", repo.list(limit), SyncError::List).await
    }

    /// Wait for every in-flight background sync, then accept new ones again.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Wait for in-flight background syncs before process exit.
    pub async fn shutdown(&self) {
        let pending = self.tracker.len();
        if pending > 0 {
            debug!(pending, "Waiting for background syncs");
        }
        self.tracker.close();
        self.tracker.wait().await;
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, RepositoryError>>,
        wrap: fn(RepositoryError) -> SyncError,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(wrap(e)),
            Err(_) => Err(SyncError::Timeout {
                operation,
                millis: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory repository with switchable outage and call counters.
    #[derive(Default)]
    pub(crate) struct MockRepository {
        pub records: Mutex<HashMap<String, ConversationRecord>>,
        pub offline: AtomicBool,
        pub delay: Mutex<Option<Duration>>,
        pub inserts: AtomicUsize,
        pub updates: AtomicUsize,
    }

    impl MockRepository {
        pub fn offline() -> Self {
            let repo = Self::default();
            repo.offline.store(true, Ordering::SeqCst);
            repo
        }

        pub fn with_record(self, id: &str, messages: Vec<Message>) -> Self {
            self.records
                .lock()
                .unwrap()
                .insert(id.to_string(), ConversationRecord::new(id, messages));
            self
        }

        fn check(&self) -> Result<(), RepositoryError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(RepositoryError::Connection("store unreachable".to_string()))
            } else {
                Ok(())
            }
        }

        async fn maybe_delay(&self) {
            let delay = *self.delay.lock().unwrap();
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
        }
    }

    impl ConversationRepository for MockRepository {
        fn name(&self) -> &str {
            "mock"
        }

        async fn find(
            &self,
            conversation_id: &str,
        ) -> Result<Option<ConversationRecord>, RepositoryError> {
            self.maybe_delay().await;
            self.check()?;
            Ok(self.records.lock().unwrap().get(conversation_id).cloned())
        }

        async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            if records.contains_key(&record.conversation_id) {
                return Err(RepositoryError::Conflict(record.conversation_id.clone()));
            }
            records.insert(record.conversation_id.clone(), record.clone());
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn update_messages(
            &self,
            conversation_id: &str,
            messages: &[Message],
        ) -> Result<(), RepositoryError> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(conversation_id)
                .ok_or(RepositoryError::NotFound)?;
            record.messages = messages.to_vec();
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
            self.check()?;
            self.records.lock().unwrap().remove(conversation_id);
            Ok(())
        }

        async fn list(
            &self,
            limit: Option<i64>,
        ) -> Result<Vec<ConversationRecord>, RepositoryError> {
            self.check()?;
            let records = self.records.lock().unwrap();
            let mut all: Vec<ConversationRecord> = records.values().cloned().collect();
            all.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
            if let Some(limit) = limit {
                all.truncate(limit as usize);
            }
            Ok(all)
        }
    }

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    fn sync_with(repo: MockRepository) -> PersistenceSync<MockRepository> {
        PersistenceSync::new(Some(repo), Duration::from_millis(200))
    }

    fn stored(sync: &PersistenceSync<MockRepository>, id: &str) -> Option<Vec<Message>> {
        sync.repo
            .as_ref()
            .unwrap()
            .records
            .lock()
            .unwrap()
            .get(id)
            .map(|r| r.messages.clone())
    }

    #[tokio::test]
    async fn first_sync_inserts_then_updates() {
        let sync = sync_with(MockRepository::default());
        let s = sid("s1");

        let first = vec![Message::user("Hello")];
        assert_eq!(sync.sync(&s, &first).await.unwrap(), SyncOutcome::Inserted);

        let second = vec![Message::user("Hello"), Message::assistant("Hi")];
        assert_eq!(sync.sync(&s, &second).await.unwrap(), SyncOutcome::Updated);

        assert_eq!(stored(&sync, "s1").unwrap(), second);
        let repo = sync.repo.as_ref().unwrap();
        assert_eq!(repo.inserts.load(Ordering::SeqCst), 1);
        assert_eq!(repo.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_sync_is_a_noop() {
        let sync = PersistenceSync::<MockRepository>::disabled();
        let outcome = sync.sync(&sid("s1"), &[Message::user("x")]).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Disabled);
        assert!(!sync.is_enabled());
        assert!(sync.backend_name().is_none());
    }

    #[tokio::test]
    async fn outage_surfaces_read_error() {
        let sync = sync_with(MockRepository::offline());
        let err = sync.sync(&sid("s1"), &[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, SyncError::Read(RepositoryError::Connection(_))));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let repo = MockRepository::default();
        *repo.delay.lock().unwrap() = Some(Duration::from_secs(5));
        let sync = PersistenceSync::new(Some(repo), Duration::from_millis(20));

        let err = sync.sync(&sid("s1"), &[Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { operation: "read", millis: 20 }));
    }

    #[tokio::test]
    async fn shorter_snapshot_is_stale() {
        let sync = sync_with(MockRepository::default());
        let s = sid("s1");

        // The short snapshot is taken first but written last.
        let short_generation = sync.begin(&s);
        let long = vec![Message::user("a"), Message::assistant("b")];
        sync.sync(&s, &long).await.unwrap();

        let short = vec![Message::user("a")];
        let outcome = sync.sync_at(&s, &short, short_generation).await.unwrap();
        sync.finish(&s);
        assert_eq!(outcome, SyncOutcome::Stale);
        assert_eq!(stored(&sync, "s1").unwrap().len(), 2);
        assert_eq!(sync.tracked_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn failed_write_does_not_advance_mark() {
        let sync = sync_with(MockRepository::default());
        let s = sid("s1");
        let repo = sync.repo.as_ref().unwrap();

        repo.offline.store(true, Ordering::SeqCst);
        let long = vec![Message::user("a"), Message::assistant("b")];
        assert!(sync.sync(&s, &long).await.is_err());

        repo.offline.store(false, Ordering::SeqCst);
        let short = vec![Message::user("a")];
        assert_eq!(sync.sync(&s, &short).await.unwrap(), SyncOutcome::Inserted);
    }

    #[tokio::test]
    async fn spawned_sync_completes_on_flush() {
        let sync = Arc::new(sync_with(MockRepository::default()));
        sync.spawn_sync(sid("s1"), vec![Message::user("hi")]);
        sync.flush().await;
        assert_eq!(stored(&sync, "s1").unwrap().len(), 1);
        assert_eq!(sync.pending(), 0);

        // Tracker accepts new work after a flush.
        sync.spawn_sync(sid("s2"), vec![Message::user("again")]);
        sync.flush().await;
        assert!(stored(&sync, "s2").is_some());
    }

    #[tokio::test]
    async fn spawned_sync_failure_is_swallowed() {
        let sync = Arc::new(sync_with(MockRepository::offline()));
        sync.spawn_sync(sid("s1"), vec![Message::user("hi")]);
        sync.flush().await;
        assert!(stored(&sync, "s1").is_none());
    }

    #[tokio::test]
    async fn delete_invalidates_earlier_snapshot() {
        let sync = Arc::new(sync_with(MockRepository::default()));
        let s = sid("s1");
        sync.sync(&s, &[Message::user("old")]).await.unwrap();

        // Snapshot generation is captured at spawn time; hold the write lock
        // so the task cannot run before the delete.
        let guard = sync.write_locks.lock(&s).await;
        sync.spawn_sync(s.clone(), vec![Message::user("old"), Message::assistant("reply")]);
        drop(guard);
        sync.delete(&s).await.unwrap();
        sync.flush().await;

        assert!(stored(&sync, "s1").is_none());
    }

    #[tokio::test]
    async fn delete_without_store_reports_disabled() {
        let sync = PersistenceSync::<MockRepository>::disabled();
        assert!(matches!(sync.delete(&sid("s1")).await, Err(SyncError::Disabled)));
    }

    #[tokio::test]
    async fn load_prefers_external_copy() {
        let remote = vec![Message::user("remote"), Message::assistant("copy")];
        let sync = sync_with(MockRepository::default().with_record("s1", remote.clone()));
        let store = MessageStore::new();
        let s = sid("s1");
        store.append(&s, Message::user("local"));

        let loaded = sync.load(&s, &store).await;
        assert_eq!(loaded, remote);
        assert_eq!(store.get(&s), remote);
    }

    #[tokio::test]
    async fn load_keeps_memory_when_external_is_behind() {
        let sync = sync_with(MockRepository::default().with_record("s1", vec![Message::user("a")]));
        let store = MessageStore::new();
        let s = sid("s1");
        store.append(&s, Message::user("a"));
        store.append(&s, Message::assistant("b"));

        let loaded = sync.load(&s, &store).await;
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn load_unknown_session_with_unreachable_store_is_empty() {
        let sync = sync_with(MockRepository::offline());
        let store = MessageStore::new();
        let loaded = sync.load(&sid("unknown-session"), &store).await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn load_falls_back_to_memory_on_outage() {
        let sync = sync_with(MockRepository::offline());
        let store = MessageStore::new();
        let s = sid("s1");
        store.append(&s, Message::user("kept"));
        let loaded = sync.load(&s, &store).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "kept");
    }

    #[tokio::test]
    async fn list_records_reports_errors_and_disabled() {
        let sync = sync_with(MockRepository::default().with_record("a", vec![]));
        assert_eq!(sync.list_records(None).await.unwrap().len(), 1);

        let offline = sync_with(MockRepository::offline());
        assert!(matches!(offline.list_records(None).await, Err(SyncError::List(_))));

        let disabled = PersistenceSync::<MockRepository>::disabled();
        assert!(matches!(disabled.list_records(None).await, Err(SyncError::Disabled)));
    }

    #[tokio::test]
    async fn deleting_unknown_sessions_leaves_no_bookkeeping() {
        let sync = Arc::new(sync_with(MockRepository::default()));
        for i in 0..1000 {
            sync.delete(&sid(&format!("never-seen-{i}"))).await.unwrap();
        }
        sync.flush().await;
        assert_eq!(sync.tracked_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn bookkeeping_is_dropped_after_syncs_finish() {
        let sync = Arc::new(sync_with(MockRepository::default()));
        for i in 0..50 {
            let s = sid(&format!("s{i}"));
            sync.spawn_sync(s.clone(), vec![Message::user("hi")]);
            sync.sync(&s, &[Message::user("hi"), Message::assistant("yo")])
                .await
                .unwrap();
        }
        sync.flush().await;
        assert_eq!(sync.tracked_sessions(), (0, 0));

        let failing = Arc::new(sync_with(MockRepository::offline()));
        failing.spawn_sync(sid("s1"), vec![Message::user("hi")]);
        failing.flush().await;
        assert_eq!(failing.tracked_sessions(), (0, 0));
    }

    #[tokio::test]
    async fn pending_snapshot_keeps_its_mark_until_done() {
        let sync = Arc::new(sync_with(MockRepository::default()));
        let s = sid("s1");

        let guard = sync.write_locks.lock(&s).await;
        sync.spawn_sync(s.clone(), vec![Message::user("hi")]);
        sync.prune_idle();
        assert_eq!(sync.tracked_sessions(), (1, 1));

        drop(guard);
        sync.flush().await;
        sync.prune_idle();
        assert_eq!(sync.tracked_sessions(), (0, 0));
    }
}
