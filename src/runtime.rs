use std::sync::Arc;

use crate::background::{BackgroundReconciler, BackgroundTaskHost};
use crate::batch::{BatchSyncEngine, SyncReport};
use crate::config::ReminderConfig;
use crate::db::SqliteRecordStore;
use crate::error::Result;
use crate::notifier::{LocalNotifier, NotificationCapability};
use crate::scheduler::ReminderScheduler;
use crate::store::RecordStore;
use crate::utils::{Clock, SystemClock};

/// The one instance of the reminder services for a process.
///
/// Built once at start-up and handed by reference to the UI command layer
/// and to the background entry point, so both use the same store and
/// notification capability.
pub struct ReminderRuntime {
    scheduler: Arc<ReminderScheduler>,
    batch: BatchSyncEngine,
    reconciler: Arc<BackgroundReconciler>,
}

impl ReminderRuntime {
    /// Opens the SQLite store at the configured path with an in-process
    /// notifier and the system clock.
    pub fn open(config: ReminderConfig) -> Result<Self> {
        config.validate()?;
        let path = config.database_path()?;
        log::info!("opening reminder database at {}", path.display());
        let store = Arc::new(SqliteRecordStore::open(&path)?);
        Ok(Self::with_parts(
            config,
            store,
            Arc::new(LocalNotifier::new()),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_parts(
        config: ReminderConfig,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn NotificationCapability>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&clock),
            config.clone(),
        ));
        let batch = BatchSyncEngine::new(Arc::clone(&scheduler));
        let reconciler = Arc::new(BackgroundReconciler::new(store, notifier, clock, config));
        Self {
            scheduler,
            batch,
            reconciler,
        }
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn batch(&self) -> &BatchSyncEngine {
        &self.batch
    }

    pub fn reconciler(&self) -> &Arc<BackgroundReconciler> {
        &self.reconciler
    }

    /// Start-up reconciliation: rebuilds every trigger from the stored
    /// reminders of the signed-in user.
    pub async fn resync(&self) -> SyncReport {
        self.batch.sync_from_store().await
    }

    pub async fn start_background(&self, host: &dyn BackgroundTaskHost) -> Result<()> {
        self.reconciler.register(host).await
    }
}
