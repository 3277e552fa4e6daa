use chrono::Utc;
use rusqlite::{params, Connection};

use crate::models::{RescheduleNotice, Selection};

pub const SELECTION_KEY: &str = "appointment-storage";
pub const TOKEN_KEY: &str = "token";
pub const RESCHEDULE_KEY: &str = "appointmentRescheduled";

// ── Raw key/value ──

pub fn get_value(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM local_state WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set_value(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();
    conn.execute(
        "INSERT INTO local_state (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

pub fn delete_value(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM local_state WHERE key = ?1", params![key])?;
    Ok(count > 0)
}

// ── Selection ──

/// Loads the persisted selection, dropping services that could not have come
/// from the catalog. Unreadable JSON yields an empty selection.
pub fn load_selection(conn: &Connection) -> anyhow::Result<Selection> {
    let Some(raw) = get_value(conn, SELECTION_KEY)? else {
        return Ok(Selection::default());
    };

    let mut selection: Selection = match serde_json::from_str(&raw) {
        Ok(selection) => selection,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable stored selection");
            return Ok(Selection::default());
        }
    };

    let before = selection.services.len();
    selection.services.retain(|s| s.is_well_formed());
    if selection.services.len() != before {
        tracing::warn!(
            dropped = before - selection.services.len(),
            "dropped malformed services from stored selection"
        );
    }

    Ok(selection)
}

pub fn save_selection(conn: &Connection, selection: &Selection) -> anyhow::Result<()> {
    let json = serde_json::to_string(selection)?;
    set_value(conn, SELECTION_KEY, &json)
}

pub fn clear_selection(conn: &Connection) -> anyhow::Result<()> {
    delete_value(conn, SELECTION_KEY)?;
    Ok(())
}

// ── Session token ──

pub fn load_token(conn: &Connection) -> anyhow::Result<Option<String>> {
    get_value(conn, TOKEN_KEY)
}

pub fn save_token(conn: &Connection, token: &str) -> anyhow::Result<()> {
    set_value(conn, TOKEN_KEY, token)
}

pub fn clear_token(conn: &Connection) -> anyhow::Result<bool> {
    delete_value(conn, TOKEN_KEY)
}

// ── Reschedule notice ──

pub fn save_reschedule_notice(conn: &Connection, notice: &RescheduleNotice) -> anyhow::Result<()> {
    let json = serde_json::to_string(notice)?;
    set_value(conn, RESCHEDULE_KEY, &json)
}

pub fn load_reschedule_notice(conn: &Connection) -> anyhow::Result<Option<RescheduleNotice>> {
    match get_value(conn, RESCHEDULE_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw).ok()),
        None => Ok(None),
    }
}

pub fn clear_reschedule_notice(conn: &Connection) -> anyhow::Result<()> {
    delete_value(conn, RESCHEDULE_KEY)?;
    Ok(())
}
