use chrono::NaiveDate;

use crate::config::ReminderConfig;
use crate::models::{NotificationContent, NotificationData, Priority, ReminderRule};

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Title, body and priority of a reminder notification as seen on `today`.
pub fn build_content(reminder: &ReminderRule, today: NaiveDate, config: &ReminderConfig) -> NotificationContent {
    let diff_days = days_between(today, reminder.next_due_date);
    let amount = format_amount(reminder.amount, &config.currency_symbol);

    let (title, body, priority) = if diff_days < 0 {
        let overdue = -diff_days;
        (
            format!("⚠️ Overdue: {}", reminder.title),
            format!(
                "{} is {} overdue. Amount: {}",
                reminder.title,
                day_count(overdue),
                amount
            ),
            Priority::Max,
        )
    } else if diff_days == 0 {
        (
            format!("💰 Due today: {}", reminder.title),
            format!("{} of {} is due today.", reminder.title, amount),
            Priority::High,
        )
    } else if diff_days == 1 {
        (
            format!("📅 Due tomorrow: {}", reminder.title),
            format!("{} of {} is due tomorrow.", reminder.title, amount),
            Priority::Default,
        )
    } else {
        (
            format!("🔔 Upcoming payment: {}", reminder.title),
            format!("{} of {} is due in {}.", reminder.title, amount, day_count(diff_days)),
            Priority::Default,
        )
    };

    NotificationContent {
        title,
        body,
        priority,
        data: NotificationData {
            reminder_id: reminder.id.clone(),
            deep_link_url: config.deep_link(&reminder.id),
        },
    }
}

fn day_count(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Currency string with thousands separators and two decimals, e.g.
/// `$1,234.50`. A missing amount renders as zero.
pub fn format_amount(amount: Option<f64>, symbol: &str) -> String {
    let amount = amount.filter(|a| a.is_finite()).unwrap_or(0.0);
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}.{:02}", sign, symbol, grouped, fraction)
}
