#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use payment_reminders::{
    LocalNotifier, NewReminder, NotificationCapability, NotificationContent, RecordStore,
    ReminderError, ReminderFilter, ReminderPatch, ReminderRule, Result, ScheduledNotification,
    Session, SqliteRecordStore, TriggerRecord,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
}

/// Ordered record of calls made against the doubles, shared by store and
/// notifier so tests can assert cross-collaborator ordering.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// `LocalNotifier` that logs every call and can be told to fail or panic.
pub struct RecordingNotifier {
    pub inner: LocalNotifier,
    pub log: CallLog,
    pub fail_schedule: AtomicBool,
    pub fail_cancel_all: AtomicBool,
    pub panic_on_immediate: AtomicBool,
}

impl RecordingNotifier {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: LocalNotifier::new(),
            log,
            fail_schedule: AtomicBool::new(false),
            fail_cancel_all: AtomicBool::new(false),
            panic_on_immediate: AtomicBool::new(false),
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl NotificationCapability for RecordingNotifier {
    async fn schedule_at(&self, content: &NotificationContent, trigger_at: NaiveDateTime) -> Result<String> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(ReminderError::Notification("scheduler unavailable".into()));
        }
        let id = self.inner.schedule_at(content, trigger_at).await?;
        self.record(format!("schedule:{}", id));
        Ok(id)
    }

    async fn schedule_immediate(&self, content: &NotificationContent) -> Result<String> {
        if self.panic_on_immediate.load(Ordering::SeqCst) {
            panic!("notification service crashed");
        }
        let id = self.inner.schedule_immediate(content).await?;
        self.record(format!("immediate:{}", content.data.reminder_id));
        Ok(id)
    }

    async fn cancel(&self, notification_id: &str) -> Result<()> {
        self.record(format!("cancel:{}", notification_id));
        self.inner.cancel(notification_id).await
    }

    async fn cancel_all(&self) -> Result<()> {
        if self.fail_cancel_all.load(Ordering::SeqCst) {
            return Err(ReminderError::Notification("cancel_all rejected".into()));
        }
        self.record("cancel_all".to_string());
        self.inner.cancel_all().await
    }

    async fn set_badge_count(&self, count: usize) -> Result<()> {
        self.record(format!("badge:{}", count));
        self.inner.set_badge_count(count).await
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        self.inner.list_scheduled().await
    }
}

/// In-memory SQLite store that logs deletes and can fail on demand.
pub struct RecordingStore {
    pub inner: SqliteRecordStore,
    pub log: CallLog,
    pub fail_list: AtomicBool,
}

impl RecordingStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            inner: SqliteRecordStore::open_in_memory().unwrap(),
            log,
            fail_list: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<ReminderRule>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ReminderError::Store("connection reset".into()));
        }
        self.inner.list_reminders(filter).await
    }

    async fn get_reminder(&self, id: &str) -> Result<Option<ReminderRule>> {
        self.inner.get_reminder(id).await
    }

    async fn insert_reminder(&self, user_id: &str, reminder: &NewReminder) -> Result<ReminderRule> {
        self.inner.insert_reminder(user_id, reminder).await
    }

    async fn update_reminder(&self, id: &str, patch: &ReminderPatch) -> Result<ReminderRule> {
        self.inner.update_reminder(id, patch).await
    }

    async fn delete_reminder(&self, id: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("delete:{}", id));
        self.inner.delete_reminder(id).await
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        self.inner.get_session().await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_setting(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_setting(key, value).await
    }

    async fn list_triggers(&self, reminder_id: &str) -> Result<Vec<TriggerRecord>> {
        self.inner.list_triggers(reminder_id).await
    }

    async fn save_trigger(&self, trigger: &TriggerRecord) -> Result<()> {
        self.inner.save_trigger(trigger).await
    }

    async fn delete_trigger(&self, reminder_id: &str, offset_days: u32) -> Result<()> {
        self.inner.delete_trigger(reminder_id, offset_days).await
    }

    async fn clear_triggers(&self, reminder_id: &str) -> Result<()> {
        self.inner.clear_triggers(reminder_id).await
    }

    async fn clear_all_triggers(&self) -> Result<()> {
        self.inner.clear_all_triggers().await
    }
}
