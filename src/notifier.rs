use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NotificationContent, ScheduledNotification};

/// The platform's local-notification facility.
#[async_trait]
pub trait NotificationCapability: Send + Sync {
    /// Registers `content` to surface at `trigger_at` and returns its handle.
    async fn schedule_at(&self, content: &NotificationContent, trigger_at: NaiveDateTime) -> Result<String>;

    /// Surfaces `content` right away.
    async fn schedule_immediate(&self, content: &NotificationContent) -> Result<String>;

    /// Cancelling an unknown or already delivered id is not an error.
    async fn cancel(&self, notification_id: &str) -> Result<()>;

    async fn cancel_all(&self) -> Result<()>;

    async fn set_badge_count(&self, count: usize) -> Result<()>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub id: String,
    pub delivered_at: Option<NaiveDateTime>,
    pub content: NotificationContent,
}

#[derive(Debug, Default)]
struct LocalState {
    scheduled: HashMap<String, ScheduledNotification>,
    delivered: Vec<DeliveredNotification>,
    badge_count: usize,
}

/// In-process notification queue.
///
/// Desktop hosts poll `take_due` and render what comes back; the mobile
/// shells swap in their OS-backed capability instead.
#[derive(Debug, Default)]
pub struct LocalNotifier {
    state: Mutex<LocalState>,
}

impl LocalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every entry whose trigger is at or before `now`,
    /// oldest first. Returned entries move to the delivered list.
    pub async fn take_due(&self, now: NaiveDateTime) -> Vec<ScheduledNotification> {
        let mut state = self.state.lock().await;
        let due_ids: Vec<String> = state
            .scheduled
            .values()
            .filter(|n| n.trigger_at <= now)
            .map(|n| n.id.clone())
            .collect();

        let mut due: Vec<ScheduledNotification> = due_ids
            .iter()
            .filter_map(|id| state.scheduled.remove(id))
            .collect();
        due.sort_by_key(|n| n.trigger_at);

        for notification in &due {
            state.delivered.push(DeliveredNotification {
                id: notification.id.clone(),
                delivered_at: Some(now),
                content: notification.content.clone(),
            });
        }
        due
    }

    pub async fn delivered(&self) -> Vec<DeliveredNotification> {
        self.state.lock().await.delivered.clone()
    }

    pub async fn badge_count(&self) -> usize {
        self.state.lock().await.badge_count
    }

    pub async fn is_scheduled(&self, notification_id: &str) -> bool {
        self.state.lock().await.scheduled.contains_key(notification_id)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.state.lock().await.scheduled.len()
    }
}

#[async_trait]
impl NotificationCapability for LocalNotifier {
    async fn schedule_at(&self, content: &NotificationContent, trigger_at: NaiveDateTime) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().await;
        state.scheduled.insert(
            id.clone(),
            ScheduledNotification {
                id: id.clone(),
                trigger_at,
                content: content.clone(),
            },
        );
        log::debug!("scheduled notification {} at {}", id, trigger_at);
        Ok(id)
    }

    async fn schedule_immediate(&self, content: &NotificationContent) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().await;
        state.delivered.push(DeliveredNotification {
            id: id.clone(),
            delivered_at: None,
            content: content.clone(),
        });
        Ok(id)
    }

    async fn cancel(&self, notification_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.scheduled.remove(notification_id).is_none() {
            log::debug!("cancel of unknown notification {}", notification_id);
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        self.state.lock().await.scheduled.clear();
        Ok(())
    }

    async fn set_badge_count(&self, count: usize) -> Result<()> {
        self.state.lock().await.badge_count = count;
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        let state = self.state.lock().await;
        let mut scheduled: Vec<ScheduledNotification> = state.scheduled.values().cloned().collect();
        scheduled.sort_by_key(|n| n.trigger_at);
        Ok(scheduled)
    }
}
