//! Lifecycle registry for managed bot workers.
//!
//! The registry is the single authority over which bots have a live worker
//! task, and the sole writer of the runtime-derived status fields in the
//! `bots` table. Each started worker is owned by one supervisor future, so
//! task completion (cancellation or failure) is observed in exactly one
//! place. The handle map is a DashMap; `start_bot` checks and inserts under
//! the entry lock, so concurrent starts for the same id serialize.
//!
//! Status is eventually consistent with registry membership: `stop_bot`
//! updates the record without waiting for the worker's cleanup, and a worker
//! failure is reported asynchronously by the supervisor.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::worker::{BotWorker, WorkerError, WorkerFactory};
use crate::db::Database;
use crate::models::BotStatus;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("bot {0} not found")]
    NotFound(i64),
    #[error("bot {0} is already running")]
    AlreadyRunning(i64),
    #[error("bot {0} is not running")]
    NotRunning(i64),
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// In-memory reference to one live worker: its cancellation token and the
/// supervisor task driving it. Never persisted.
struct WorkerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct BotManager {
    db: Arc<Database>,
    factory: Arc<dyn WorkerFactory>,
    active: Arc<DashMap<i64, WorkerHandle>>,
    restart_pause: Duration,
}

impl BotManager {
    pub fn new(db: Arc<Database>, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            db,
            factory,
            active: Arc::new(DashMap::new()),
            restart_pause: Duration::from_secs(1),
        }
    }

    /// Override the pause between stop and start in `restart_bot`.
    pub fn with_restart_pause(mut self, pause: Duration) -> Self {
        self.restart_pause = pause;
        self
    }

    /// Start the worker for a persisted bot.
    ///
    /// On success the record transitions to `running` with a fresh
    /// `started_at`. If the worker cannot be built, the record transitions
    /// to `error` and no handle is stored.
    pub async fn start_bot(&self, bot_id: i64) -> Result<(), ControlError> {
        let bot = self
            .db
            .get_bot(bot_id)?
            .ok_or(ControlError::NotFound(bot_id))?;

        let slot = match self.active.entry(bot_id) {
            Entry::Occupied(_) => {
                log::warn!("Bot {} ({}) is already running", bot_id, bot.name);
                return Err(ControlError::AlreadyRunning(bot_id));
            }
            Entry::Vacant(slot) => slot,
        };

        let worker = match self.factory.build(&bot) {
            Ok(worker) => worker,
            Err(e) => {
                drop(slot);
                log::error!("Failed to build worker for bot {} ({}): {}", bot_id, bot.name, e);
                if let Err(db_err) = self.db.mark_bot_errored(bot_id) {
                    log::error!("Failed to record error status for bot {}: {}", bot_id, db_err);
                }
                return Err(ControlError::Worker(e));
            }
        };

        // Persist the running status before the supervisor exists: its
        // error write is ordered after the insert below, so a fast-failing
        // worker can never be overwritten with `running`.
        if let Err(e) = self.db.mark_bot_started(bot_id) {
            drop(slot);
            log::error!("Failed to persist running status for bot {}: {}", bot_id, e);
            return Err(ControlError::Database(e));
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::supervise(
            self.db.clone(),
            Arc::clone(&self.active),
            bot_id,
            bot.name.clone(),
            worker,
            cancel.clone(),
        ));
        slot.insert(WorkerHandle { cancel, task });

        log::info!("Bot {} ({}) started", bot_id, bot.name);
        Ok(())
    }

    /// Stop a running worker. Cancellation is cooperative and unawaited:
    /// the record is updated before the worker task finishes its cleanup.
    pub async fn stop_bot(&self, bot_id: i64) -> Result<(), ControlError> {
        let (_, handle) = self
            .active
            .remove(&bot_id)
            .ok_or(ControlError::NotRunning(bot_id))?;

        handle.cancel.cancel();
        drop(handle.task); // detached; the supervisor finishes on its own

        self.db.mark_bot_stopped(bot_id)?;
        log::info!("Bot {} stopped", bot_id);
        Ok(())
    }

    /// Stop (failure ignored), pause, then a single start attempt.
    pub async fn restart_bot(&self, bot_id: i64) -> Result<(), ControlError> {
        if let Err(e) = self.stop_bot(bot_id).await {
            log::debug!("Restart of bot {}: stop phase skipped ({})", bot_id, e);
        }
        tokio::time::sleep(self.restart_pause).await;
        self.start_bot(bot_id).await
    }

    /// Advisory count of live handles; not transactional with the store.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// True if a live worker handle is registered for the bot.
    pub fn is_active(&self, bot_id: i64) -> bool {
        self.active.contains_key(&bot_id)
    }

    /// Stop every running worker. Individual failures are logged, not surfaced.
    pub async fn stop_all(&self) {
        let ids: Vec<i64> = self.active.iter().map(|entry| *entry.key()).collect();
        for bot_id in ids {
            if let Err(e) = self.stop_bot(bot_id).await {
                log::warn!("Failed to stop bot {}: {}", bot_id, e);
            }
        }
        log::info!("All bots stopped");
    }

    /// The registry is rebuilt empty on process restart, so any persisted
    /// `running` row is stale. Flag such rows as errored so the panel does
    /// not display dead workers as live; they can be started again normally.
    pub fn reconcile_startup(&self) -> Result<usize, ControlError> {
        let mut reconciled = 0;
        for bot in self.db.list_bots()? {
            if bot.status == BotStatus::Running {
                log::warn!(
                    "Bot {} ({}) was marked running with no live worker; flagging as error",
                    bot.id,
                    bot.name
                );
                self.db.mark_bot_errored(bot.id)?;
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }

    /// Owns the worker's run loop. On a runtime failure it removes the
    /// handle and writes the error status, unless cancellation was
    /// requested, in which case `stop_bot` owns the status write.
    async fn supervise(
        db: Arc<Database>,
        active: Arc<DashMap<i64, WorkerHandle>>,
        bot_id: i64,
        name: String,
        worker: Arc<dyn BotWorker>,
        cancel: CancellationToken,
    ) {
        let result = worker.run(cancel.clone()).await;
        worker.shutdown().await;

        match result {
            Ok(()) => {
                if cancel.is_cancelled() {
                    log::info!("Bot {} ({}) worker shut down", bot_id, name);
                } else {
                    // The loop ended on its own; drop the stale handle.
                    log::warn!("Bot {} ({}) worker exited unexpectedly", bot_id, name);
                    active.remove(&bot_id);
                }
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    log::debug!("Bot {} ({}) worker failed during shutdown: {}", bot_id, name, e);
                    return;
                }
                log::error!("Bot {} ({}) worker failed: {}", bot_id, name, e);
                active.remove(&bot_id);
                if let Err(db_err) = db.mark_bot_errored(bot_id) {
                    log::error!("Failed to record error status for bot {}: {}", bot_id, db_err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct MockWorker {
        fail: bool,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl BotWorker for MockWorker {
        async fn run(&self, cancel: CancellationToken) -> Result<(), WorkerError> {
            if self.fail {
                return Err(WorkerError::Connect("simulated polling error".into()));
            }
            cancel.cancelled().await;
            Ok(())
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockFactory {
        fail_build: bool,
        fail_run: bool,
        shutdowns: Arc<AtomicUsize>,
    }

    impl WorkerFactory for MockFactory {
        fn build(&self, _bot: &Bot) -> Result<Arc<dyn BotWorker>, WorkerError> {
            if self.fail_build {
                return Err(WorkerError::Build("simulated build failure".into()));
            }
            Ok(Arc::new(MockWorker {
                fail: self.fail_run,
                shutdowns: self.shutdowns.clone(),
            }))
        }
    }

    struct Harness {
        manager: BotManager,
        db: Arc<Database>,
        shutdowns: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    fn harness(fail_build: bool, fail_run: bool) -> Harness {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("test.db").to_str().unwrap()).unwrap());
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(MockFactory {
            fail_build,
            fail_run,
            shutdowns: shutdowns.clone(),
        });
        let manager = BotManager::new(db.clone(), factory)
            .with_restart_pause(Duration::from_millis(10));
        Harness {
            manager,
            db,
            shutdowns,
            _dir: dir,
        }
    }

    async fn wait_for_status(db: &Database, bot_id: i64, status: BotStatus) {
        for _ in 0..200 {
            if db.get_bot(bot_id).unwrap().unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("bot {} never reached status {:?}", bot_id, status);
    }

    #[tokio::test]
    async fn test_start_unknown_bot_fails_without_side_effects() {
        let h = harness(false, false);

        let result = h.manager.start_bot(999).await;
        assert!(matches!(result, Err(ControlError::NotFound(999))));
        assert_eq!(h.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_handle_fails() {
        let h = harness(false, false);
        let bot = h.db.create_bot("idle", "1:t", None).unwrap();

        let result = h.manager.stop_bot(bot.id).await;
        assert!(matches!(result, Err(ControlError::NotRunning(_))));
        // No side effects on the record either
        assert_eq!(
            h.db.get_bot(bot.id).unwrap().unwrap().status,
            BotStatus::Stopped
        );
    }

    #[tokio::test]
    async fn test_restart_unknown_bot_fails() {
        let h = harness(false, false);

        let result = h.manager.restart_bot(999).await;
        assert!(matches!(result, Err(ControlError::NotFound(999))));
        assert_eq!(h.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_start_updates_record_and_count() {
        let h = harness(false, false);
        let bot = h.db.create_bot("worker-a", "1:t", None).unwrap();

        h.manager.start_bot(bot.id).await.unwrap();

        assert_eq!(h.manager.active_count(), 1);
        assert!(h.manager.is_active(bot.id));
        let record = h.db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(record.status, BotStatus::Running);
        assert!(record.is_active);
        assert!(record.started_at.is_some());

        h.manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_scenario_double_start_then_stop() {
        let h = harness(false, false);
        let bot = h.db.create_bot("bot-a", "T1", None).unwrap();

        h.manager.start_bot(bot.id).await.unwrap();
        assert_eq!(h.manager.active_count(), 1);

        let second = h.manager.start_bot(bot.id).await;
        assert!(matches!(second, Err(ControlError::AlreadyRunning(_))));
        assert_eq!(h.manager.active_count(), 1);

        h.manager.stop_bot(bot.id).await.unwrap();
        assert_eq!(h.manager.active_count(), 0);
        let record = h.db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(record.status, BotStatus::Stopped);
        assert!(!record.is_active);
        assert!(record.started_at.is_none());
    }

    #[tokio::test]
    async fn test_stopped_worker_is_shut_down() {
        let h = harness(false, false);
        let bot = h.db.create_bot("bot-a", "1:t", None).unwrap();

        h.manager.start_bot(bot.id).await.unwrap();
        h.manager.stop_bot(bot.id).await.unwrap();

        // The supervisor releases the session after cancellation
        for _ in 0..200 {
            if h.shutdowns.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("worker session was never released");
    }

    #[tokio::test]
    async fn test_restart_leaves_exactly_one_handle() {
        let h = harness(false, false);
        let bot = h.db.create_bot("bot-a", "1:t", None).unwrap();

        h.manager.start_bot(bot.id).await.unwrap();
        h.manager.restart_bot(bot.id).await.unwrap();

        assert_eq!(h.manager.active_count(), 1);
        let record = h.db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(record.status, BotStatus::Running);

        h.manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_restart_starts_a_stopped_bot() {
        let h = harness(false, false);
        let bot = h.db.create_bot("bot-a", "1:t", None).unwrap();

        // Not running: the stop phase fails and is ignored
        h.manager.restart_bot(bot.id).await.unwrap();
        assert_eq!(h.manager.active_count(), 1);

        h.manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_stop_all_reduces_count_to_zero() {
        let h = harness(false, false);
        let a = h.db.create_bot("bot-a", "1:t", None).unwrap();
        let b = h.db.create_bot("bot-b", "2:t", None).unwrap();

        h.manager.start_bot(a.id).await.unwrap();
        h.manager.start_bot(b.id).await.unwrap();
        assert_eq!(h.manager.active_count(), 2);

        // Simulate a handle disappearing mid-flight; stop_all must still
        // drain the rest without surfacing the failure.
        h.manager.active.remove(&a.id);

        h.manager.stop_all().await;
        assert_eq!(h.manager.active_count(), 0);
        assert_eq!(
            h.db.get_bot(b.id).unwrap().unwrap().status,
            BotStatus::Stopped
        );
    }

    #[tokio::test]
    async fn test_worker_failure_sets_error_status() {
        let h = harness(false, true);
        let bot = h.db.create_bot("bot-b", "2:t", None).unwrap();

        // Launch succeeds; the failure is reported asynchronously.
        h.manager.start_bot(bot.id).await.unwrap();

        wait_for_status(&h.db, bot.id, BotStatus::Error).await;
        let record = h.db.get_bot(bot.id).unwrap().unwrap();
        assert!(!record.is_active);

        // The supervisor also dropped the handle, so a new start is allowed
        for _ in 0..200 {
            if h.manager.active_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("failed worker handle was never removed");
    }

    #[tokio::test]
    async fn test_build_failure_sets_error_status() {
        let h = harness(true, false);
        let bot = h.db.create_bot("bot-a", "1:t", None).unwrap();

        let result = h.manager.start_bot(bot.id).await;
        assert!(matches!(result, Err(ControlError::Worker(_))));
        assert_eq!(h.manager.active_count(), 0);

        let record = h.db.get_bot(bot.id).unwrap().unwrap();
        assert_eq!(record.status, BotStatus::Error);
        assert!(!record.is_active);
    }

    #[tokio::test]
    async fn test_error_bot_can_be_started_again() {
        let h = harness(false, false);
        let bot = h.db.create_bot("bot-a", "1:t", None).unwrap();
        h.db.mark_bot_errored(bot.id).unwrap();

        h.manager.start_bot(bot.id).await.unwrap();
        assert_eq!(
            h.db.get_bot(bot.id).unwrap().unwrap().status,
            BotStatus::Running
        );

        h.manager.stop_all().await;
    }

    #[tokio::test]
    async fn test_reconcile_startup_flags_stale_running_rows() {
        let h = harness(false, false);
        let stale = h.db.create_bot("stale", "1:t", None).unwrap();
        let clean = h.db.create_bot("clean", "2:t", None).unwrap();
        h.db.mark_bot_started(stale.id).unwrap();

        let reconciled = h.manager.reconcile_startup().unwrap();
        assert_eq!(reconciled, 1);

        let record = h.db.get_bot(stale.id).unwrap().unwrap();
        assert_eq!(record.status, BotStatus::Error);
        assert!(!record.is_active);
        assert_eq!(
            h.db.get_bot(clean.id).unwrap().unwrap().status,
            BotStatus::Stopped
        );
    }
}
