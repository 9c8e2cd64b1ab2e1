//! Audit trail of provider calls and field transformations.
//!
//! Every event is written to the `event_log` table and mirrored to the `log`
//! facade so host applications see it in their own logger as well.

use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub ts: i64,
    pub level: String,
    pub code: Option<String>,
    pub module: String,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

pub fn log_event(
    conn: &Connection,
    level: &str,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) -> rusqlite::Result<()> {
    log::log!(
        target: module,
        facade_level(level),
        "[{}] {}{}",
        code.unwrap_or("-"),
        message,
        data.as_ref().map(|d| format!(" {d}")).unwrap_or_default()
    );

    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, ts, level, code, module, message, explain, data_str],
    )?;
    Ok(())
}

/// Most recent events first.
pub fn recent_events(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, level, code, module, message, explain, data FROM event_log ORDER BY ts DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        let data: Option<String> = row.get(7)?;
        Ok(EventRecord {
            id: row.get(0)?,
            ts: row.get(1)?,
            level: row.get(2)?,
            code: row.get(3)?,
            module: row.get(4)?,
            message: row.get(5)?,
            explain: row.get(6)?,
            data: data.and_then(|d| serde_json::from_str(&d).ok()),
        })
    })?;
    rows.collect()
}

fn facade_level(level: &str) -> log::Level {
    match level {
        "error" => log::Level::Error,
        "warn" => log::Level::Warn,
        "debug" => log::Level::Debug,
        _ => log::Level::Info,
    }
}
