use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// How often a payment repeats.
///
/// Stored and serialized as its snake_case name. Any name this crate does
/// not know becomes `Unrecognized`, which recurs like `Monthly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
    Custom,
    Unrecognized,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::HalfYearly => "half_yearly",
            Frequency::Yearly => "yearly",
            Frequency::Custom => "custom",
            Frequency::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            "quarterly" => Frequency::Quarterly,
            "half_yearly" => Frequency::HalfYearly,
            "yearly" => Frequency::Yearly,
            "custom" => Frequency::Custom,
            _ => Frequency::Unrecognized,
        }
    }
}

impl From<String> for Frequency {
    fn from(value: String) -> Self {
        Frequency::parse(&value)
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.as_str().to_string()
    }
}

/// A recurring payment reminder as persisted in the `reminders` table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReminderRule {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub reminder_time: Option<NaiveTime>,
    pub is_active: bool,
    pub notification_enabled: bool,
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub custom_interval: Option<u32>,
    #[serde(default)]
    pub advance_notice: u32,
    pub notification_id: Option<String>,
    pub last_paid_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: String,
}

/// Form input for a reminder that does not exist yet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewReminder {
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub reminder_time: Option<NaiveTime>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub notification_enabled: bool,
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub custom_interval: Option<u32>,
    #[serde(default)]
    pub advance_notice: u32,
}

fn default_true() -> bool {
    true
}

impl NewReminder {
    /// A monthly reminder due on `next_due_date`, everything else defaulted.
    pub fn monthly(title: impl Into<String>, next_due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: None,
            amount: None,
            category: None,
            frequency: Frequency::Monthly,
            next_due_date,
            end_date: None,
            reminder_time: None,
            is_active: true,
            notification_enabled: true,
            day_of_month: Some(chrono::Datelike::day(&next_due_date)),
            day_of_week: None,
            custom_interval: None,
            advance_notice: 0,
        }
    }
}

/// Fields a user may change when editing a reminder.
///
/// The due date, the paid date and the notification handle only change
/// through mark-as-paid and scheduling, so they are not here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReminderEdit {
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub end_date: Option<NaiveDate>,
    pub reminder_time: Option<NaiveTime>,
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub custom_interval: Option<u32>,
    pub advance_notice: u32,
}

/// Partial update applied by `RecordStore::update_reminder`.
///
/// `None` leaves a field untouched. Nullable fields use a nested option so
/// `Some(None)` clears them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub amount: Option<Option<f64>>,
    pub category: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub next_due_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub reminder_time: Option<Option<NaiveTime>>,
    pub is_active: Option<bool>,
    pub notification_enabled: Option<bool>,
    pub day_of_month: Option<Option<u32>>,
    pub day_of_week: Option<Option<u32>>,
    pub custom_interval: Option<Option<u32>>,
    pub advance_notice: Option<u32>,
    pub notification_id: Option<Option<String>>,
    pub last_paid_date: Option<Option<NaiveDate>>,
}

impl ReminderPatch {
    pub fn notification_id(id: Option<String>) -> Self {
        Self {
            notification_id: Some(id),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, rule: &mut ReminderRule) {
        if let Some(title) = &self.title {
            rule.title = title.clone();
        }
        if let Some(description) = &self.description {
            rule.description = description.clone();
        }
        if let Some(amount) = self.amount {
            rule.amount = amount;
        }
        if let Some(category) = &self.category {
            rule.category = category.clone();
        }
        if let Some(frequency) = self.frequency {
            rule.frequency = frequency;
        }
        if let Some(next_due_date) = self.next_due_date {
            rule.next_due_date = next_due_date;
        }
        if let Some(end_date) = self.end_date {
            rule.end_date = end_date;
        }
        if let Some(reminder_time) = self.reminder_time {
            rule.reminder_time = reminder_time;
        }
        if let Some(is_active) = self.is_active {
            rule.is_active = is_active;
        }
        if let Some(enabled) = self.notification_enabled {
            rule.notification_enabled = enabled;
        }
        if let Some(day_of_month) = self.day_of_month {
            rule.day_of_month = day_of_month;
        }
        if let Some(day_of_week) = self.day_of_week {
            rule.day_of_week = day_of_week;
        }
        if let Some(custom_interval) = self.custom_interval {
            rule.custom_interval = custom_interval;
        }
        if let Some(advance_notice) = self.advance_notice {
            rule.advance_notice = advance_notice;
        }
        if let Some(notification_id) = &self.notification_id {
            rule.notification_id = notification_id.clone();
        }
        if let Some(last_paid_date) = self.last_paid_date {
            rule.last_paid_date = last_paid_date;
        }
    }
}

impl From<ReminderEdit> for ReminderPatch {
    fn from(edit: ReminderEdit) -> Self {
        Self {
            title: Some(edit.title),
            description: Some(edit.description),
            amount: Some(edit.amount),
            category: Some(edit.category),
            frequency: Some(edit.frequency),
            end_date: Some(edit.end_date),
            reminder_time: Some(edit.reminder_time),
            day_of_month: Some(edit.day_of_month),
            day_of_week: Some(edit.day_of_week),
            custom_interval: Some(edit.custom_interval),
            advance_notice: Some(edit.advance_notice),
            ..Self::default()
        }
    }
}

/// Row filter for `RecordStore::list_reminders`. Unset fields match everything.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReminderFilter {
    pub user_id: Option<String>,
    pub is_active: Option<bool>,
    /// Only reminders whose `next_due_date` is strictly before this date.
    pub due_before: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Default,
    High,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub reminder_id: String,
    pub deep_link_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub data: NotificationData,
}

/// An entry in the notification capability's pending set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: String,
    pub trigger_at: NaiveDateTime,
    pub content: NotificationContent,
}

/// One registered trigger of a reminder, keyed by `(reminder_id, offset_days)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub reminder_id: String,
    pub offset_days: u32,
    pub notification_id: String,
    pub trigger_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
}

/// Outcome reported back to the background task host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    NoData,
    NewData,
    Failed,
}

/// Action buttons attached to a delivered reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Open,
    MarkPaid,
    Snooze,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Opened { deep_link_url: String },
    MarkedPaid { next_due_date: NaiveDate },
    Snoozed { notification_id: String },
    Ignored,
}
