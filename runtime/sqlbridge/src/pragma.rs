///
/// Connection pragma probe.
///
/// A pragma is first asked of the engine (`PRAGMA <name>`). The engine
/// silently ignores pragmas it does not know, so when it returns no row the
/// probe falls back to the bridge pragma table, a temporary rowid-less
/// table installed on every connection the bridge opens. `show_datatypes`
/// lives there: the engine has no such setting of its own.
///
/// The table is ordinary SQL state, so statements run through `exec` can
/// change it too; callers re-probe instead of caching across executions.
///
/// Reading a pragma runs it. Pragmas that do work when run (checkpoints,
/// integrity checks, vacuuming) are refused rather than probed.
///

use rusqlite::{Connection, OptionalExtension};
use sqlbridge_core::{EngineError, Value};

use crate::convert::raw_text;
use crate::error::{engine_error, BridgeError, Result};

/// Pragma that makes rows report declared column types.
pub const SHOW_DATATYPES: &str = "show_datatypes";

pub(crate) const PRAGMA_TABLE: &str = "sqlbridge_pragma";

/// Pragmas whose bare form performs an action instead of reporting a setting.
const ACTION_PRAGMAS: &[&str] = &[
    "foreign_key_check",
    "incremental_vacuum",
    "integrity_check",
    "optimize",
    "quick_check",
    "shrink_memory",
    "wal_checkpoint",
];

pub(crate) fn install(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TEMP TABLE IF NOT EXISTS {} (name TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL) WITHOUT ROWID",
        PRAGMA_TABLE
    ))
}

/// Whether `name` is on for this connection.
///
/// `bridge_table` tells whether the bridge pragma table was installed.
pub(crate) fn enabled(conn: &Connection, name: &str, bridge_table: bool) -> Result<bool> {
    validate_name(name)?;
    if ACTION_PRAGMAS.iter().any(|p| p.eq_ignore_ascii_case(name)) {
        return Err(BridgeError::InvalidArgument(format!(
            "pragma '{}' performs an action and has no status to read",
            name
        )));
    }

    let reported = engine_value(conn, name).map_err(|e| probe_failed(name, e))?;
    if let Some(value) = reported {
        return Ok(is_truthy(&value));
    }
    if !bridge_table {
        return Ok(false);
    }

    let stored: Option<String> = conn
        .query_row(
            &format!("SELECT value FROM temp.{} WHERE name = ?1", PRAGMA_TABLE),
            [name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| probe_failed(name, e))?;

    Ok(stored.is_some_and(|v| is_truthy(&v)))
}

pub(crate) fn set(conn: &Connection, name: &str, on: bool) -> Result<()> {
    validate_name(name)?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO temp.{} (name, value) VALUES (?1, ?2)",
            PRAGMA_TABLE
        ),
        [name, if on { "ON" } else { "OFF" }],
    )?;
    Ok(())
}

fn engine_value(conn: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(&format!("PRAGMA {}", name), [], |row| {
        Ok(match raw_text(row.get_ref(0)?) {
            Value::Text(text) => text,
            _ => String::new(),
        })
    })
    .optional()
}

fn probe_failed(name: &str, e: rusqlite::Error) -> BridgeError {
    let cause = engine_error(e);
    BridgeError::Engine(EngineError {
        message: format!(
            "could not determine status of pragma '{}' ({})",
            name, cause.message
        ),
        ..cause
    })
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BridgeError::InvalidArgument(format!(
            "invalid pragma name '{}'",
            name
        )))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "ON" | "1" | "TRUE" | "YES"
    )
}
