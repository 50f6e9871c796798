use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewReminder, ReminderFilter, ReminderPatch, ReminderRule, Session, TriggerRecord};

/// Persistence surface the scheduler needs: the reminders table, the
/// trigger ledger, a key/value settings table and the signed-in session.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Matching reminders ordered by `next_due_date`.
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<ReminderRule>>;

    async fn get_reminder(&self, id: &str) -> Result<Option<ReminderRule>>;

    async fn insert_reminder(&self, user_id: &str, reminder: &NewReminder) -> Result<ReminderRule>;

    /// Applies `patch` and returns the stored result.
    /// Fails with `NotFound` when no reminder has this id.
    async fn update_reminder(&self, id: &str, patch: &ReminderPatch) -> Result<ReminderRule>;

    /// Removes the reminder together with its ledger rows.
    async fn delete_reminder(&self, id: &str) -> Result<()>;

    async fn get_session(&self) -> Result<Option<Session>>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn list_triggers(&self, reminder_id: &str) -> Result<Vec<TriggerRecord>>;

    /// Inserts or replaces the ledger row for `(reminder_id, offset_days)`.
    async fn save_trigger(&self, trigger: &TriggerRecord) -> Result<()>;

    async fn delete_trigger(&self, reminder_id: &str, offset_days: u32) -> Result<()>;

    async fn clear_triggers(&self, reminder_id: &str) -> Result<()>;

    async fn clear_all_triggers(&self) -> Result<()>;
}
