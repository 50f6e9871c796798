use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::batch::cleanup_stale_notifications;
use crate::config::ReminderConfig;
use crate::content::build_content;
use crate::error::Result;
use crate::models::{BackgroundFetchResult, ReminderFilter};
use crate::notifier::NotificationCapability;
use crate::store::RecordStore;
use crate::utils::{format_timestamp, parse_timestamp, Clock};

pub const BACKGROUND_TASK_ID: &str = "payment-reminder-check";
pub const LAST_CLEANUP_KEY: &str = "last_notification_cleanup";

pub type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, BackgroundFetchResult> + Send + Sync>;

/// Whatever runs app code periodically while the app is not in front.
#[async_trait]
pub trait BackgroundTaskHost: Send + Sync {
    async fn register_periodic_task(&self, task_id: &str, min_interval: StdDuration, handler: TaskHandler) -> Result<()>;
}

/// Catch-up pass for overdue reminders that runs outside the foreground app.
///
/// Talks to the store and the notification capability directly instead of
/// going through `ReminderScheduler`, and never writes `notification_id`.
pub struct BackgroundReconciler {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn NotificationCapability>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
}

impl BackgroundReconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn NotificationCapability>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
        }
    }

    /// One invocation. Errors and panics inside the pass come back as
    /// `Failed`; nothing escapes to the host.
    pub async fn run(&self) -> BackgroundFetchResult {
        match AssertUnwindSafe(self.run_pass()).catch_unwind().await {
            Ok(Ok(true)) => BackgroundFetchResult::NewData,
            Ok(Ok(false)) => BackgroundFetchResult::NoData,
            Ok(Err(e)) => {
                log::error!("background reminder check failed: {}", e);
                BackgroundFetchResult::Failed
            }
            Err(_) => {
                log::error!("background reminder check panicked");
                BackgroundFetchResult::Failed
            }
        }
    }

    async fn run_pass(&self) -> Result<bool> {
        let Some(session) = self.store.get_session().await? else {
            log::debug!("background reminder check: no signed-in user");
            return Ok(false);
        };

        let today = self.clock.today();
        let overdue = self
            .store
            .list_reminders(&ReminderFilter {
                user_id: Some(session.user_id),
                is_active: Some(true),
                due_before: Some(today),
            })
            .await?;

        let mut fired = 0;
        for reminder in overdue.iter().filter(|r| r.notification_enabled) {
            let content = build_content(reminder, today, &self.config);
            self.notifier.schedule_immediate(&content).await?;
            fired += 1;
        }
        if fired > 0 {
            log::info!("background reminder check: {} overdue notifications sent", fired);
        }

        let cleaned = self.cleanup_if_due().await?;
        Ok(fired > 0 || cleaned)
    }

    /// Runs the stale-notification cleanup when the last one is more than
    /// `cleanup_interval_hours` old (or never happened).
    async fn cleanup_if_due(&self) -> Result<bool> {
        let now = self.clock.now();
        let last_cleanup = match self.store.get_setting(LAST_CLEANUP_KEY).await? {
            Some(value) => match parse_timestamp(&value) {
                Ok(at) => Some(at),
                Err(e) => {
                    log::warn!("ignoring unreadable {}: {}", LAST_CLEANUP_KEY, e);
                    None
                }
            },
            None => None,
        };
        let due = match last_cleanup {
            Some(last) => now - last > Duration::hours(self.config.cleanup_interval_hours),
            None => true,
        };
        if !due {
            return Ok(false);
        }

        cleanup_stale_notifications(self.notifier.as_ref(), now, self.config.stale_notification_days).await?;
        self.store.set_setting(LAST_CLEANUP_KEY, &format_timestamp(now)).await?;
        Ok(true)
    }

    /// Registers `run` with the host under `BACKGROUND_TASK_ID`.
    pub async fn register(self: &Arc<Self>, host: &dyn BackgroundTaskHost) -> Result<()> {
        let reconciler = Arc::clone(self);
        let handler: TaskHandler = Arc::new(move || {
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.run().await }.boxed()
        });
        let min_interval = StdDuration::from_secs(self.config.background_interval_secs);
        host.register_periodic_task(BACKGROUND_TASK_ID, min_interval, handler).await?;
        log::info!(
            "registered background task {} every {:?}",
            BACKGROUND_TASK_ID,
            min_interval
        );
        Ok(())
    }
}

/// `BackgroundTaskHost` for desktop builds: each task runs on a tokio
/// interval until stopped. The first run happens one interval after
/// registration.
#[derive(Default)]
pub struct TokioTaskHost {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioTaskHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stop(&self, task_id: &str) -> bool {
        match self.tasks.lock().await.remove(task_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        for (_, handle) in self.tasks.lock().await.drain() {
            handle.abort();
        }
    }

    pub async fn is_running(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(task_id)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TokioTaskHost {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.get_mut().drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl BackgroundTaskHost for TokioTaskHost {
    async fn register_periodic_task(&self, task_id: &str, min_interval: StdDuration, handler: TaskHandler) -> Result<()> {
        let name = task_id.to_string();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + min_interval, min_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let result = handler().await;
                log::debug!("background task {} finished with {:?}", name, result);
            }
        });

        if let Some(previous) = self.tasks.lock().await.insert(task_id.to_string(), task) {
            previous.abort();
        }
        Ok(())
    }
}
