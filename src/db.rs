use std::path::Path;

use async_trait::async_trait;
use chrono::Local;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ReminderError, Result};
use crate::models::{
    Frequency, NewReminder, ReminderFilter, ReminderPatch, ReminderRule, Session, TriggerRecord,
};
use crate::store::RecordStore;
use crate::utils::{
    format_date, format_time, format_timestamp, parse_date, parse_time, parse_timestamp,
};

const REMINDER_COLUMNS: &str = "id, user_id, title, description, amount, category, frequency, \
     next_due_date, end_date, reminder_time, is_active, notification_enabled, day_of_month, \
     day_of_week, custom_interval, advance_notice, notification_id, last_paid_date, created_at";

/// `RecordStore` over a local SQLite database.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Records the signed-in user. Replaces any previous session.
    pub async fn set_session(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO auth_session (id, user_id, signed_in_at) VALUES (1, ?1, ?2)",
            params![user_id, format_timestamp(Local::now().naive_local())],
        )?;
        Ok(())
    }

    pub async fn clear_session(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM auth_session", [])?;
        Ok(())
    }
}

/// Creates the schema and adds columns missing from older databases.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS reminders (
      id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL DEFAULT '',
      title TEXT NOT NULL,
      description TEXT,
      amount REAL,
      category TEXT,
      frequency TEXT NOT NULL DEFAULT 'monthly',
      next_due_date TEXT NOT NULL,
      end_date TEXT,
      reminder_time TEXT,
      is_active BOOLEAN NOT NULL DEFAULT 1,
      notification_enabled BOOLEAN NOT NULL DEFAULT 1,
      day_of_month INTEGER,
      day_of_week INTEGER,
      custom_interval INTEGER,
      advance_notice INTEGER NOT NULL DEFAULT 0,
      notification_id TEXT,
      last_paid_date TEXT,
      created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders (user_id, is_active, next_due_date);
    CREATE TABLE IF NOT EXISTS reminder_triggers (
      reminder_id TEXT NOT NULL,
      offset_days INTEGER NOT NULL,
      notification_id TEXT NOT NULL,
      trigger_at TEXT NOT NULL,
      PRIMARY KEY (reminder_id, offset_days),
      FOREIGN KEY (reminder_id) REFERENCES reminders (id) ON DELETE CASCADE
    );
    CREATE TABLE IF NOT EXISTS settings (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL,
      updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS auth_session (
      id INTEGER PRIMARY KEY CHECK (id = 1),
      user_id TEXT NOT NULL,
      signed_in_at TEXT NOT NULL
    );
  "#,
    )?;

    // Databases created before notification preferences existed lack these.
    let existing = table_columns(conn, "reminders")?;
    let migrations = [
        ("notification_enabled", "BOOLEAN NOT NULL DEFAULT 1"),
        ("advance_notice", "INTEGER NOT NULL DEFAULT 0"),
        ("notification_id", "TEXT"),
        ("last_paid_date", "TEXT"),
        ("end_date", "TEXT"),
    ];
    for (column, definition) in migrations {
        if !existing.iter().any(|c| c == column) {
            log::info!("migrating reminders: adding column {}", column);
            conn.execute(
                &format!("ALTER TABLE reminders ADD COLUMN {} {}", column, definition),
                [],
            )?;
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut info_stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = info_stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}

fn conversion_error(idx: usize, e: ReminderError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn required<T>(row: &Row, idx: usize, parse: fn(&str) -> Result<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional<T>(row: &Row, idx: usize, parse: fn(&str) -> Result<T>) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse(value).map(Some).map_err(|e| conversion_error(idx, e)),
    }
}

fn row_to_reminder(row: &Row) -> rusqlite::Result<ReminderRule> {
    let frequency: String = row.get(6)?;
    Ok(ReminderRule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        frequency: Frequency::parse(&frequency),
        next_due_date: required(row, 7, parse_date)?,
        end_date: optional(row, 8, parse_date)?,
        reminder_time: optional(row, 9, parse_time)?,
        is_active: row.get(10)?,
        notification_enabled: row.get(11)?,
        day_of_month: row.get(12)?,
        day_of_week: row.get(13)?,
        custom_interval: row.get(14)?,
        advance_notice: row.get(15)?,
        notification_id: row.get(16)?,
        last_paid_date: optional(row, 17, parse_date)?,
        created_at: row.get(18)?,
    })
}

fn row_to_trigger(row: &Row) -> rusqlite::Result<TriggerRecord> {
    Ok(TriggerRecord {
        reminder_id: row.get(0)?,
        offset_days: row.get(1)?,
        notification_id: row.get(2)?,
        trigger_at: required(row, 3, parse_timestamp)?,
    })
}

fn fetch_reminder(conn: &Connection, id: &str) -> Result<Option<ReminderRule>> {
    let reminder = conn
        .query_row(
            &format!("SELECT {} FROM reminders WHERE id = ?1", REMINDER_COLUMNS),
            params![id],
            row_to_reminder,
        )
        .optional()?;
    Ok(reminder)
}

fn query_reminders(conn: &Connection, filter: &ReminderFilter) -> Result<Vec<ReminderRule>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(user_id) = &filter.user_id {
        clauses.push("user_id = ?");
        values.push(Value::Text(user_id.clone()));
    }
    if let Some(is_active) = filter.is_active {
        clauses.push("is_active = ?");
        values.push(Value::Integer(i64::from(is_active)));
    }
    if let Some(due_before) = filter.due_before {
        clauses.push("next_due_date < ?");
        values.push(Value::Text(format_date(due_before)));
    }

    let mut sql = format!("SELECT {} FROM reminders", REMINDER_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY next_due_date ASC, created_at ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_reminder)?;
    let mut reminders = Vec::new();
    for r in rows {
        reminders.push(r?);
    }
    Ok(reminders)
}

fn write_reminder(conn: &Connection, rule: &ReminderRule) -> Result<()> {
    conn.execute(
        "UPDATE reminders SET title = ?1, description = ?2, amount = ?3, category = ?4, frequency = ?5,
                next_due_date = ?6, end_date = ?7, reminder_time = ?8, is_active = ?9,
                notification_enabled = ?10, day_of_month = ?11, day_of_week = ?12, custom_interval = ?13,
                advance_notice = ?14, notification_id = ?15, last_paid_date = ?16
         WHERE id = ?17",
        params![
            rule.title,
            rule.description,
            rule.amount,
            rule.category,
            rule.frequency.as_str(),
            format_date(rule.next_due_date),
            rule.end_date.map(format_date),
            rule.reminder_time.map(format_time),
            rule.is_active,
            rule.notification_enabled,
            rule.day_of_month,
            rule.day_of_week,
            rule.custom_interval,
            rule.advance_notice,
            rule.notification_id,
            rule.last_paid_date.map(format_date),
            rule.id,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<ReminderRule>> {
        let conn = self.conn.lock().await;
        query_reminders(&conn, filter)
    }

    async fn get_reminder(&self, id: &str) -> Result<Option<ReminderRule>> {
        let conn = self.conn.lock().await;
        fetch_reminder(&conn, id)
    }

    async fn insert_reminder(&self, user_id: &str, reminder: &NewReminder) -> Result<ReminderRule> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO reminders (id, user_id, title, description, amount, category, frequency,
                                    next_due_date, end_date, reminder_time, is_active, notification_enabled,
                                    day_of_month, day_of_week, custom_interval, advance_notice, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                id,
                user_id,
                reminder.title,
                reminder.description,
                reminder.amount,
                reminder.category,
                reminder.frequency.as_str(),
                format_date(reminder.next_due_date),
                reminder.end_date.map(format_date),
                reminder.reminder_time.map(format_time),
                reminder.is_active,
                reminder.notification_enabled,
                reminder.day_of_month,
                reminder.day_of_week,
                reminder.custom_interval,
                reminder.advance_notice,
                format_timestamp(Local::now().naive_local()),
            ],
        )?;
        fetch_reminder(&conn, &id)?.ok_or(ReminderError::NotFound(id))
    }

    async fn update_reminder(&self, id: &str, patch: &ReminderPatch) -> Result<ReminderRule> {
        let conn = self.conn.lock().await;
        let mut rule = fetch_reminder(&conn, id)?.ok_or_else(|| ReminderError::NotFound(id.to_string()))?;
        if patch.is_empty() {
            return Ok(rule);
        }
        patch.apply(&mut rule);
        write_reminder(&conn, &rule)?;
        Ok(rule)
    }

    async fn delete_reminder(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(ReminderError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        let conn = self.conn.lock().await;
        let session = conn
            .query_row("SELECT user_id FROM auth_session WHERE id = 1", [], |row| {
                Ok(Session { user_id: row.get(0)? })
            })
            .optional()?;
        Ok(session)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    async fn list_triggers(&self, reminder_id: &str) -> Result<Vec<TriggerRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT reminder_id, offset_days, notification_id, trigger_at FROM reminder_triggers
             WHERE reminder_id = ?1 ORDER BY offset_days DESC",
        )?;
        let rows = stmt.query_map(params![reminder_id], row_to_trigger)?;
        let mut triggers = Vec::new();
        for t in rows {
            triggers.push(t?);
        }
        Ok(triggers)
    }

    async fn save_trigger(&self, trigger: &TriggerRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO reminder_triggers (reminder_id, offset_days, notification_id, trigger_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                trigger.reminder_id,
                trigger.offset_days,
                trigger.notification_id,
                format_timestamp(trigger.trigger_at),
            ],
        )?;
        Ok(())
    }

    async fn delete_trigger(&self, reminder_id: &str, offset_days: u32) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM reminder_triggers WHERE reminder_id = ?1 AND offset_days = ?2",
            params![reminder_id, offset_days],
        )?;
        Ok(())
    }

    async fn clear_triggers(&self, reminder_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM reminder_triggers WHERE reminder_id = ?1", params![reminder_id])?;
        Ok(())
    }

    async fn clear_all_triggers(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM reminder_triggers", [])?;
        Ok(())
    }
}
