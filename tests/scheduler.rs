mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use common::{at, calls, date, CallLog, RecordingNotifier, RecordingStore};
use payment_reminders::{
    FixedClock, Frequency, NewReminder, NotificationCapability, RecordStore, ReminderConfig,
    ReminderPatch, ReminderRule, ReminderScheduler,
};

struct Harness {
    log: CallLog,
    store: Arc<RecordingStore>,
    notifier: Arc<RecordingNotifier>,
    scheduler: ReminderScheduler,
}

async fn harness(now: NaiveDateTime) -> Harness {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(RecordingStore::new(log.clone()));
    store.inner.set_session("user-1").await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new(log.clone()));
    let scheduler = ReminderScheduler::new(
        store.clone(),
        notifier.clone(),
        Arc::new(FixedClock::new(now)),
        ReminderConfig::default(),
    );
    Harness {
        log,
        store,
        notifier,
        scheduler,
    }
}

async fn insert_with_id(h: &Harness, new: NewReminder, notification_id: Option<&str>) -> ReminderRule {
    let created = h.store.insert_reminder("user-1", &new).await.unwrap();
    h.store
        .update_reminder(
            &created.id,
            &ReminderPatch::notification_id(notification_id.map(str::to_string)),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn scheduling_twice_leaves_a_single_live_notification() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let reminder = insert_with_id(&h, NewReminder::monthly("Rent", date(2024, 3, 15)), None).await;

    let first = h.scheduler.schedule_notification(&reminder, 0).await.unwrap();
    let second = h.scheduler.schedule_notification(&reminder, 0).await.unwrap();

    assert_ne!(first, second);
    assert!(!h.notifier.inner.is_scheduled(&first).await);
    assert!(h.notifier.inner.is_scheduled(&second).await);
    assert_eq!(h.notifier.inner.scheduled_count().await, 1);

    // once persisted on the record, the id is cancelled through that path
    let mut persisted = reminder.clone();
    persisted.notification_id = Some(second.clone());
    let third = h.scheduler.schedule_notification(&persisted, 0).await.unwrap();
    assert!(!h.notifier.inner.is_scheduled(&second).await);
    assert!(h.notifier.inner.is_scheduled(&third).await);
    assert_eq!(h.notifier.inner.scheduled_count().await, 1);
}

#[tokio::test]
async fn past_trigger_is_skipped_but_the_old_id_is_still_cancelled() {
    let h = harness(at(2024, 3, 15, 12)).await;
    let reminder = insert_with_id(&h, NewReminder::monthly("Rent", date(2024, 3, 10)), Some("old")).await;

    let scheduled = h.scheduler.schedule_notification(&reminder, 0).await;

    assert!(scheduled.is_none());
    let log = calls(&h.log);
    assert!(log.contains(&"cancel:old".to_string()));
    assert!(!log.iter().any(|c| c.starts_with("schedule:")));
}

#[tokio::test]
async fn same_day_trigger_already_passed_is_skipped() {
    // due today at 09:00, it is 09:00 now
    let h = harness(at(2024, 3, 15, 9)).await;
    let reminder = insert_with_id(&h, NewReminder::monthly("Rent", date(2024, 3, 15)), None).await;

    assert!(h.scheduler.schedule_notification(&reminder, 0).await.is_none());
    assert_eq!(h.notifier.inner.scheduled_count().await, 0);
}

#[tokio::test]
async fn disabled_notifications_schedule_nothing() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let reminder = insert_with_id(
        &h,
        NewReminder {
            notification_enabled: false,
            ..NewReminder::monthly("Rent", date(2024, 3, 15))
        },
        None,
    )
    .await;

    assert!(h.scheduler.schedule_notification(&reminder, 0).await.is_none());
    assert!(h.scheduler.schedule_reminder(&reminder).await.is_none());
    assert_eq!(h.notifier.inner.scheduled_count().await, 0);
}

#[tokio::test]
async fn mark_as_paid_only_moves_the_due_date_forward() {
    let h = harness(at(2024, 3, 16, 10)).await;
    let before = insert_with_id(
        &h,
        NewReminder {
            day_of_month: Some(15),
            frequency: Frequency::Monthly,
            ..NewReminder::monthly("Rent", date(2024, 3, 15))
        },
        None,
    )
    .await;

    let next = h.scheduler.mark_as_paid(&before).await;

    assert_eq!(next, Some(date(2024, 4, 15)));
    let mut after = h.store.get_reminder(&before.id).await.unwrap().unwrap();
    assert_eq!(after.next_due_date, date(2024, 4, 15));
    assert_eq!(after.last_paid_date, Some(date(2024, 3, 16)));
    assert!(after.notification_id.is_some());

    after.next_due_date = before.next_due_date;
    after.last_paid_date = before.last_paid_date;
    after.notification_id = before.notification_id.clone();
    assert_eq!(after, before);

    let scheduled = h.notifier.list_scheduled().await.unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].trigger_at, at(2024, 4, 15, 9));
}

#[tokio::test]
async fn toggling_off_cancels_and_clears_the_id() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let reminder = insert_with_id(&h, NewReminder::monthly("Gym", date(2024, 3, 20)), Some("abc")).await;

    assert!(h.scheduler.toggle_active(&reminder, false).await);

    assert!(calls(&h.log).contains(&"cancel:abc".to_string()));
    let stored = h.store.get_reminder(&reminder.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(stored.notification_id.is_none());

    assert!(h.scheduler.toggle_active(&stored, true).await);
    let stored = h.store.get_reminder(&reminder.id).await.unwrap().unwrap();
    assert!(stored.is_active);
    let id = stored.notification_id.unwrap();
    assert!(h.notifier.inner.is_scheduled(&id).await);
}

#[tokio::test]
async fn delete_cancels_before_removing_the_record() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let reminder = insert_with_id(&h, NewReminder::monthly("Netflix", date(2024, 3, 20)), Some("xyz")).await;

    assert!(h.scheduler.delete_reminder(&reminder).await);

    let log = calls(&h.log);
    let cancel = log.iter().position(|c| c == "cancel:xyz").unwrap();
    let delete = log.iter().position(|c| *c == format!("delete:{}", reminder.id)).unwrap();
    assert!(cancel < delete);
    assert!(h.store.get_reminder(&reminder.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_also_cancels_the_advance_notice_trigger() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let created = h
        .scheduler
        .create_reminder(&NewReminder {
            advance_notice: 3,
            ..NewReminder::monthly("Car loan", date(2024, 3, 20))
        })
        .await
        .unwrap();
    assert_eq!(h.notifier.inner.scheduled_count().await, 2);

    assert!(h.scheduler.delete_reminder(&created).await);

    assert_eq!(h.notifier.inner.scheduled_count().await, 0);
}

#[tokio::test]
async fn capability_failure_degrades_to_no_notification() {
    let h = harness(at(2024, 3, 1, 12)).await;
    h.notifier.fail_schedule.store(true, Ordering::SeqCst);

    let created = h
        .scheduler
        .create_reminder(&NewReminder::monthly("Water", date(2024, 3, 20)))
        .await
        .unwrap();

    assert!(created.notification_id.is_none());
    assert!(h.scheduler.schedule_notification(&created, 0).await.is_none());
    assert_eq!(h.store.get_reminder(&created.id).await.unwrap().unwrap().title, "Water");
}

#[tokio::test]
async fn inactive_reminder_loses_its_stale_id_on_replan() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let reminder = insert_with_id(
        &h,
        NewReminder {
            is_active: false,
            ..NewReminder::monthly("Old plan", date(2024, 3, 20))
        },
        Some("stale"),
    )
    .await;

    assert!(h.scheduler.schedule_reminder(&reminder).await.is_none());

    assert!(calls(&h.log).contains(&"cancel:stale".to_string()));
    let stored = h.store.get_reminder(&reminder.id).await.unwrap().unwrap();
    assert!(stored.notification_id.is_none());
}

#[tokio::test]
async fn paying_with_an_outdated_copy_never_moves_the_due_date_back() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let original = h
        .scheduler
        .create_reminder(&NewReminder::monthly("Rent", date(2024, 3, 15)))
        .await
        .unwrap();

    assert_eq!(h.scheduler.mark_as_paid(&original).await, Some(date(2024, 4, 15)));
    let current = h.store.get_reminder(&original.id).await.unwrap().unwrap();
    assert_eq!(h.scheduler.mark_as_paid(&current).await, Some(date(2024, 5, 15)));

    // still holding the record as it was before both payments
    let next = h.scheduler.mark_as_paid(&original).await;

    let stored = h.store.get_reminder(&original.id).await.unwrap().unwrap();
    assert_eq!(next, Some(date(2024, 6, 15)));
    assert_eq!(stored.next_due_date, date(2024, 6, 15));
}

#[tokio::test]
async fn rescheduling_one_offset_leaves_no_dead_ledger_rows() {
    let h = harness(at(2024, 3, 1, 12)).await;
    let created = h
        .scheduler
        .create_reminder(&NewReminder {
            advance_notice: 3,
            ..NewReminder::monthly("Car loan", date(2024, 3, 20))
        })
        .await
        .unwrap();
    assert_eq!(h.store.list_triggers(&created.id).await.unwrap().len(), 2);

    let replaced = h.scheduler.schedule_notification(&created, 0).await.unwrap();

    let ledger = h.store.list_triggers(&created.id).await.unwrap();
    for trigger in &ledger {
        assert!(
            h.notifier.inner.is_scheduled(&trigger.notification_id).await,
            "ledger row at offset {} points at a cancelled notification",
            trigger.offset_days
        );
    }
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].notification_id, replaced);
    assert_eq!(h.notifier.inner.scheduled_count().await, 1);
}
