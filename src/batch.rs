use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use futures::future::join_all;
use serde::Serialize;

use crate::error::Result;
use crate::models::{ReminderFilter, ReminderRule};
use crate::notifier::NotificationCapability;
use crate::scheduler::ReminderScheduler;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    /// Reminders that ended up with at least one live trigger.
    pub scheduled: usize,
    /// Inactive, opted out, past-dated or ended reminders.
    pub skipped: usize,
    pub failed: usize,
    pub badge_count: usize,
}

/// Cancels pending notifications whose trigger lies more than
/// `max_age_days` before `now`. Returns how many were cancelled.
pub async fn cleanup_stale_notifications(
    notifier: &dyn NotificationCapability,
    now: NaiveDateTime,
    max_age_days: i64,
) -> Result<usize> {
    let cutoff = now - Duration::days(max_age_days);
    let mut removed = 0;
    for notification in notifier.list_scheduled().await? {
        if notification.trigger_at < cutoff {
            notifier.cancel(&notification.id).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("cleaned up {} stale notifications older than {}", removed, cutoff);
    }
    Ok(removed)
}

/// Full resync of every reminder against the notification capability.
pub struct BatchSyncEngine {
    scheduler: Arc<ReminderScheduler>,
}

impl BatchSyncEngine {
    pub fn new(scheduler: Arc<ReminderScheduler>) -> Self {
        Self { scheduler }
    }

    /// Cancels everything that is registered, sets the badge to the number of
    /// live reminders, then re-plans each reminder in batches of
    /// `sync_batch_size` with `sync_batch_delay_ms` between batches.
    pub async fn sync_all(&self, reminders: &[ReminderRule]) -> SyncReport {
        let notifier = self.scheduler.notifier();
        let store = self.scheduler.store();
        let config = self.scheduler.config();
        let mut report = SyncReport {
            total: reminders.len(),
            ..SyncReport::default()
        };

        if let Err(e) = notifier.cancel_all().await {
            log::error!("resync aborted: cancelling all notifications failed: {}", e);
            report.failed = reminders.len();
            return report;
        }
        if let Err(e) = store.clear_all_triggers().await {
            log::warn!("failed to clear trigger ledger before resync: {}", e);
        }

        report.badge_count = reminders
            .iter()
            .filter(|r| r.is_active && r.notification_enabled)
            .count();
        if let Err(e) = notifier.set_badge_count(report.badge_count).await {
            log::warn!("failed to set badge count: {}", e);
        }

        let batch_size = config.sync_batch_size.max(1);
        let batch_delay = StdDuration::from_millis(config.sync_batch_delay_ms);
        let mut batches = reminders.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            let results = join_all(batch.iter().map(|r| self.resync_one(r))).await;
            for (reminder, result) in batch.iter().zip(results) {
                match result {
                    Ok(Some(_)) => report.scheduled += 1,
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        log::error!("resync of reminder {} failed: {}", reminder.id, e);
                        report.failed += 1;
                    }
                }
            }
            if batches.peek().is_some() && !batch_delay.is_zero() {
                tokio::time::sleep(batch_delay).await;
            }
        }

        log::info!(
            "resynced {} reminders: {} scheduled, {} skipped, {} failed",
            report.total,
            report.scheduled,
            report.skipped,
            report.failed
        );
        report
    }

    async fn resync_one(&self, reminder: &ReminderRule) -> Result<Option<String>> {
        // Cancelling the stale handle again is harmless after cancel_all.
        self.scheduler.plan_triggers(reminder).await
    }

    /// Resyncs every reminder of the signed-in user. Signed out means an
    /// empty report.
    pub async fn sync_from_store(&self) -> SyncReport {
        let store = self.scheduler.store();
        let session = match store.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                log::info!("no signed-in user, skipping reminder resync");
                return SyncReport::default();
            }
            Err(e) => {
                log::error!("failed to read session for resync: {}", e);
                return SyncReport::default();
            }
        };
        let filter = ReminderFilter {
            user_id: Some(session.user_id),
            ..ReminderFilter::default()
        };
        match store.list_reminders(&filter).await {
            Ok(reminders) => self.sync_all(&reminders).await,
            Err(e) => {
                log::error!("failed to load reminders for resync: {}", e);
                SyncReport::default()
            }
        }
    }

    pub async fn cleanup_notifications(&self) -> usize {
        let config = self.scheduler.config();
        let now = self.scheduler.clock().now();
        match cleanup_stale_notifications(
            self.scheduler.notifier().as_ref(),
            now,
            config.stale_notification_days,
        )
        .await
        {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("notification cleanup failed: {}", e);
                0
            }
        }
    }
}
