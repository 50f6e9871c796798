use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::config::ReminderConfig;
use crate::content::build_content;
use crate::error::{ReminderError, Result};
use crate::models::{
    ActionOutcome, NewReminder, NotificationAction, ReminderEdit, ReminderPatch, ReminderRule,
    TriggerRecord,
};
use crate::notifier::NotificationCapability;
use crate::recurrence::next_due_date_for;
use crate::store::RecordStore;
use crate::utils::{trigger_datetime, Clock};

/// Day offsets a reminder is notified at, primary first: the advance-notice
/// day and, when that is not the due day itself, the due day as well.
pub fn trigger_offsets(reminder: &ReminderRule) -> Vec<u32> {
    if reminder.advance_notice > 0 {
        vec![reminder.advance_notice, 0]
    } else {
        vec![0]
    }
}

/// Keeps each reminder's registered notifications in line with its record.
///
/// Every mutation cancels what is registered for the reminder before
/// registering replacements. Failures from the store or the notification
/// capability are logged and reported as `None`/`false`; they never reach
/// the caller.
pub struct ReminderScheduler {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn NotificationCapability>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
}

impl ReminderScheduler {
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

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationCapability> {
        &self.notifier
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Registers a single trigger `days_before` the due date.
    ///
    /// The reminder's current `notification_id` and any ledger entry at the
    /// same offset are cancelled first, even when the new trigger ends up
    /// skipped because it is not in the future. Persisting the returned id
    /// on the record is left to the caller.
    pub async fn schedule_notification(&self, reminder: &ReminderRule, days_before: u32) -> Option<String> {
        if !reminder.notification_enabled {
            log::debug!("notifications disabled for reminder {}", reminder.id);
            return None;
        }
        match self.try_schedule_notification(reminder, days_before).await {
            Ok(id) => id,
            Err(e) => {
                log::error!("failed to schedule reminder {}: {}", reminder.id, e);
                None
            }
        }
    }

    async fn try_schedule_notification(&self, reminder: &ReminderRule, days_before: u32) -> Result<Option<String>> {
        let ledger = self.store.list_triggers(&reminder.id).await?;
        if let Some(existing) = &reminder.notification_id {
            self.notifier.cancel(existing).await?;
            // The primary may be recorded under another offset.
            for stale in ledger
                .iter()
                .filter(|t| t.notification_id == *existing && t.offset_days != days_before)
            {
                self.store.delete_trigger(&reminder.id, stale.offset_days).await?;
            }
        }
        if let Some(previous) = ledger.iter().find(|t| t.offset_days == days_before) {
            if reminder.notification_id.as_deref() != Some(previous.notification_id.as_str()) {
                self.notifier.cancel(&previous.notification_id).await?;
            }
            self.store.delete_trigger(&reminder.id, days_before).await?;
        }
        self.register_trigger(reminder, days_before).await
    }

    /// Cancels everything registered for the reminder, then applies the
    /// trigger plan (`trigger_offsets`) and stores the primary id on the
    /// record. Inactive or opted-out reminders end up with no id.
    pub async fn schedule_reminder(&self, reminder: &ReminderRule) -> Option<String> {
        match self.plan_triggers(reminder).await {
            Ok(id) => id,
            Err(e) => {
                log::error!("failed to plan notifications for reminder {}: {}", reminder.id, e);
                None
            }
        }
    }

    pub(crate) async fn plan_triggers(&self, reminder: &ReminderRule) -> Result<Option<String>> {
        // The caller's copy may be older than the row.
        let stored_id = self
            .store
            .get_reminder(&reminder.id)
            .await?
            .ok_or_else(|| ReminderError::NotFound(reminder.id.clone()))?
            .notification_id;
        if let Some(stored) = stored_id.as_deref() {
            if reminder.notification_id.as_deref() != Some(stored) {
                self.notifier.cancel(stored).await?;
            }
        }
        self.cancel_registered(reminder).await?;

        let mut primary = None;
        if reminder.is_active && reminder.notification_enabled {
            for offset in trigger_offsets(reminder) {
                if let Some(id) = self.register_trigger(reminder, offset).await? {
                    primary.get_or_insert(id);
                }
            }
        }

        if primary != stored_id {
            self.store
                .update_reminder(&reminder.id, &ReminderPatch::notification_id(primary.clone()))
                .await?;
        }
        Ok(primary)
    }

    async fn register_trigger(&self, reminder: &ReminderRule, days_before: u32) -> Result<Option<String>> {
        if let Some(end_date) = reminder.end_date {
            if reminder.next_due_date > end_date {
                log::info!(
                    "reminder {} is past its end date {}, not scheduling",
                    reminder.id,
                    end_date
                );
                return Ok(None);
            }
        }

        let time = reminder.reminder_time.unwrap_or_else(|| self.config.default_time());
        let Some(trigger_at) = trigger_datetime(reminder.next_due_date, days_before, time) else {
            return Ok(None);
        };
        let now = self.clock.now();
        if trigger_at <= now {
            log::debug!(
                "skipping trigger for reminder {}: {} is not in the future",
                reminder.id,
                trigger_at
            );
            return Ok(None);
        }

        // Worded for the day it fires, not for today.
        let content = build_content(reminder, trigger_at.date(), &self.config);
        let notification_id = self.notifier.schedule_at(&content, trigger_at).await?;
        self.store
            .save_trigger(&TriggerRecord {
                reminder_id: reminder.id.clone(),
                offset_days: days_before,
                notification_id: notification_id.clone(),
                trigger_at,
            })
            .await?;
        log::info!(
            "scheduled reminder {} ({} days before) at {}",
            reminder.id,
            days_before,
            trigger_at
        );
        Ok(Some(notification_id))
    }

    /// Cancels the stale primary id and every ledger trigger; clears the ledger.
    async fn cancel_registered(&self, reminder: &ReminderRule) -> Result<()> {
        if let Some(existing) = &reminder.notification_id {
            self.notifier.cancel(existing).await?;
        }
        for trigger in self.store.list_triggers(&reminder.id).await? {
            if reminder.notification_id.as_deref() != Some(trigger.notification_id.as_str()) {
                self.notifier.cancel(&trigger.notification_id).await?;
            }
        }
        self.store.clear_triggers(&reminder.id).await
    }

    /// Cancels every registered notification of the reminder and clears its id.
    pub async fn cancel_all_for(&self, reminder: &ReminderRule) -> bool {
        let result = async {
            self.cancel_registered(reminder).await?;
            if reminder.notification_id.is_some() {
                self.store
                    .update_reminder(&reminder.id, &ReminderPatch::notification_id(None))
                    .await?;
            }
            Ok::<(), ReminderError>(())
        }
        .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to cancel notifications for reminder {}: {}", reminder.id, e);
                false
            }
        }
    }

    /// Records a payment: moves `next_due_date` one period forward, stamps
    /// `last_paid_date` and re-plans notifications.
    ///
    /// The period is taken from the stored row, not from `reminder`, so an
    /// outdated copy cannot move the due date back.
    ///
    /// When the new date lies beyond `end_date` the series is finished: the
    /// reminder is deactivated and its notifications cancelled.
    pub async fn mark_as_paid(&self, reminder: &ReminderRule) -> Option<NaiveDate> {
        self.mark_paid_by_id(&reminder.id).await
    }

    async fn mark_paid_by_id(&self, reminder_id: &str) -> Option<NaiveDate> {
        let reminder = match self.store.get_reminder(reminder_id).await {
            Ok(Some(reminder)) => reminder,
            Ok(None) => {
                log::warn!("cannot mark unknown reminder {} as paid", reminder_id);
                return None;
            }
            Err(e) => {
                log::error!("failed to load reminder {}: {}", reminder_id, e);
                return None;
            }
        };
        let next_due_date = next_due_date_for(&reminder);
        let finished = reminder.end_date.is_some_and(|end| next_due_date > end);
        let patch = ReminderPatch {
            next_due_date: Some(next_due_date),
            last_paid_date: Some(Some(self.clock.today())),
            is_active: finished.then_some(false),
            ..ReminderPatch::default()
        };

        let updated = match self.store.update_reminder(&reminder.id, &patch).await {
            Ok(updated) => updated,
            Err(e) => {
                log::error!("failed to mark reminder {} as paid: {}", reminder.id, e);
                return None;
            }
        };

        if finished {
            log::info!("reminder {} reached its end date, deactivating", reminder.id);
            self.cancel_all_for(&updated).await;
        } else {
            self.schedule_reminder(&updated).await;
        }
        Some(next_due_date)
    }

    pub async fn toggle_active(&self, reminder: &ReminderRule, active: bool) -> bool {
        let patch = ReminderPatch {
            is_active: Some(active),
            ..ReminderPatch::default()
        };
        self.apply_toggle(reminder, &patch, active).await
    }

    pub async fn set_notifications_enabled(&self, reminder: &ReminderRule, enabled: bool) -> bool {
        let patch = ReminderPatch {
            notification_enabled: Some(enabled),
            ..ReminderPatch::default()
        };
        self.apply_toggle(reminder, &patch, enabled).await
    }

    async fn apply_toggle(&self, reminder: &ReminderRule, patch: &ReminderPatch, on: bool) -> bool {
        let updated = match self.store.update_reminder(&reminder.id, patch).await {
            Ok(updated) => updated,
            Err(e) => {
                log::error!("failed to update reminder {}: {}", reminder.id, e);
                return false;
            }
        };
        if on {
            self.plan_triggers(&updated)
                .await
                .map_err(|e| log::error!("failed to plan notifications for reminder {}: {}", reminder.id, e))
                .is_ok()
        } else {
            self.cancel_all_for(&updated).await
        }
    }

    /// Cancels the reminder's notifications, then deletes the record.
    /// Nothing is deleted when cancelling fails.
    pub async fn delete_reminder(&self, reminder: &ReminderRule) -> bool {
        if let Err(e) = self.cancel_registered(reminder).await {
            log::error!(
                "not deleting reminder {}: cancelling its notifications failed: {}",
                reminder.id,
                e
            );
            return false;
        }
        match self.store.delete_reminder(&reminder.id).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to delete reminder {}: {}", reminder.id, e);
                false
            }
        }
    }

    /// One-off notification `snooze_minutes` from now. Leaves the due date,
    /// the ledger and the primary id alone.
    pub async fn snooze(&self, reminder_id: &str) -> Option<String> {
        let reminder = match self.store.get_reminder(reminder_id).await {
            Ok(Some(reminder)) => reminder,
            Ok(None) => {
                log::warn!("cannot snooze unknown reminder {}", reminder_id);
                return None;
            }
            Err(e) => {
                log::error!("failed to load reminder {} for snooze: {}", reminder_id, e);
                return None;
            }
        };

        let now = self.clock.now();
        let content = build_content(&reminder, now.date(), &self.config);
        let trigger_at = now + Duration::minutes(self.config.snooze_minutes);
        match self.notifier.schedule_at(&content, trigger_at).await {
            Ok(id) => {
                log::info!("snoozed reminder {} until {}", reminder_id, trigger_at);
                Some(id)
            }
            Err(e) => {
                log::error!("failed to snooze reminder {}: {}", reminder_id, e);
                None
            }
        }
    }

    /// Saves a new reminder for the signed-in user and schedules it.
    pub async fn create_reminder(&self, reminder: &NewReminder) -> Option<ReminderRule> {
        let result = async {
            let session = self
                .store
                .get_session()
                .await?
                .ok_or_else(|| ReminderError::Store("no signed-in user".to_string()))?;
            self.store.insert_reminder(&session.user_id, reminder).await
        }
        .await;

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                log::error!("failed to create reminder '{}': {}", reminder.title, e);
                return None;
            }
        };
        self.schedule_reminder(&created).await;
        self.reload(created).await
    }

    /// Applies a form edit and re-plans notifications. The due date is kept.
    pub async fn update_reminder(&self, id: &str, edit: ReminderEdit) -> Option<ReminderRule> {
        let updated = match self.store.update_reminder(id, &ReminderPatch::from(edit)).await {
            Ok(updated) => updated,
            Err(e) => {
                log::error!("failed to update reminder {}: {}", id, e);
                return None;
            }
        };
        self.schedule_reminder(&updated).await;
        self.reload(updated).await
    }

    async fn reload(&self, fallback: ReminderRule) -> Option<ReminderRule> {
        match self.store.get_reminder(&fallback.id).await {
            Ok(Some(current)) => Some(current),
            Ok(None) => None,
            Err(e) => {
                log::warn!("failed to reload reminder {}: {}", fallback.id, e);
                Some(fallback)
            }
        }
    }

    /// Handles a tap on a notification or one of its action buttons.
    pub async fn handle_action(&self, reminder_id: &str, action: NotificationAction) -> ActionOutcome {
        match action {
            NotificationAction::Open => ActionOutcome::Opened {
                deep_link_url: self.config.deep_link(reminder_id),
            },
            NotificationAction::Snooze => match self.snooze(reminder_id).await {
                Some(notification_id) => ActionOutcome::Snoozed { notification_id },
                None => ActionOutcome::Ignored,
            },
            NotificationAction::MarkPaid => match self.mark_paid_by_id(reminder_id).await {
                Some(next_due_date) => ActionOutcome::MarkedPaid { next_due_date },
                None => ActionOutcome::Ignored,
            },
        }
    }
}
