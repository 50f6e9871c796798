pub mod background;
pub mod batch;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod models;
pub mod notifier;
pub mod recurrence;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export the record types
pub use models::{
    ActionOutcome, BackgroundFetchResult, Frequency, NewReminder, NotificationAction,
    NotificationContent, NotificationData, Priority, ReminderEdit, ReminderFilter, ReminderPatch,
    ReminderRule, ScheduledNotification, Session, TriggerRecord,
};

pub use error::{ReminderError, Result};
pub use config::ReminderConfig;

// Re-export the pure calculators
pub use recurrence::compute_next_due_date;
pub use content::{build_content, format_amount};

// Re-export the collaborator seams and their local implementations
pub use store::RecordStore;
pub use db::SqliteRecordStore;
pub use notifier::{LocalNotifier, NotificationCapability};
pub use background::{BackgroundReconciler, BackgroundTaskHost, TokioTaskHost};
pub use utils::{Clock, FixedClock, SystemClock};

// Re-export the services
pub use scheduler::ReminderScheduler;
pub use batch::{BatchSyncEngine, SyncReport};
pub use runtime::ReminderRuntime;
