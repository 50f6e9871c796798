use chrono::{Datelike, Days, NaiveDate};

use crate::models::{Frequency, ReminderRule};

/// Next occurrence after `base_date` for the given rule.
///
/// Month-based frequencies clamp the day to the target month's length, so
/// `2024-01-31` monthly on day 31 gives `2024-02-29`. The result is always
/// strictly after `base_date` (except at chrono's upper date limit).
pub fn compute_next_due_date(
    frequency: Frequency,
    base_date: NaiveDate,
    day_of_month: Option<u32>,
    _day_of_week: Option<u32>,
    custom_interval: Option<u32>,
) -> NaiveDate {
    match frequency {
        Frequency::Daily => add_days(base_date, 1),
        Frequency::Weekly => add_days(base_date, 7),
        Frequency::Monthly => add_months_clamped(base_date, 1, day_of_month),
        Frequency::Quarterly => add_months_clamped(base_date, 3, None),
        Frequency::HalfYearly => add_months_clamped(base_date, 6, None),
        Frequency::Yearly => add_months_clamped(base_date, 12, None),
        Frequency::Custom => add_days(base_date, u64::from(custom_interval.unwrap_or(1).max(1))),
        Frequency::Unrecognized => add_months_clamped(base_date, 1, None),
    }
}

/// `compute_next_due_date` fed from a stored reminder.
pub fn next_due_date_for(reminder: &ReminderRule) -> NaiveDate {
    compute_next_due_date(
        reminder.frequency,
        reminder.next_due_date,
        reminder.day_of_month,
        reminder.day_of_week,
        reminder.custom_interval,
    )
}

/// Moves `months` forward and lands on `day` (or the base day), clamped to
/// the last day of the target month.
pub fn add_months_clamped(date: NaiveDate, months: u32, day: Option<u32>) -> NaiveDate {
    let month_index = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = month_index.div_euclid(12);
    let month = month_index.rem_euclid(12) as u32 + 1;
    let day = day
        .unwrap_or_else(|| date.day())
        .clamp(1, days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| add_days(date, 1))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}
