use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "accessd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS a11y_prefs(
            identity TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    // Early builds stored the payload without a timestamp. Add and leave NULL.
    ensure_prefs_updated_at(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Loads the most recent preference payload for an identity, or None when the
/// identity has never saved. Callers fall back to defaults on any error.
pub fn prefs_load(conn: &Connection, identity: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM a11y_prefs WHERE identity = ?",
            [identity],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Upsert keyed by identity, last write wins. No delete path exists; absent
/// rows mean defaults.
pub fn prefs_upsert(
    conn: &Connection,
    identity: &str,
    payload: &serde_json::Value,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO a11y_prefs(identity, payload, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(identity) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        (identity, serde_json::to_string(payload)?, now),
    )?;
    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_prefs_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "a11y_prefs", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE a11y_prefs ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
