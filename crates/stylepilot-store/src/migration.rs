//! Schema migrations.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are recorded in `_migrations`, so running them twice is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Append new ones to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "session-scoped key-value state",
        sql: r#"
            CREATE TABLE session_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                scope      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX idx_session_state_scope ON session_state(scope);
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// Synchronous; call it through [`crate::Database::execute`].
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "state schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(failed(0, "reading schema version"))
}

// ── internals ────────────────────────────────────────────────────────

fn failed(version: u32, step: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::Migration {
        version,
        message: format!("{step}: {e}"),
    }
}

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(failed(0, "creating _migrations"))
}

/// Apply one migration and record it, atomically. Dropping the transaction
/// on an error path rolls it back.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let Migration {
        version,
        description,
        sql,
    } = *migration;
    info!(version, description, "applying migration");

    let tx = conn
        .unchecked_transaction()
        .map_err(failed(version, "opening transaction"))?;
    tx.execute_batch(sql)
        .map_err(failed(version, "executing schema change"))
        .inspect_err(|err| warn!(version, %err, "migration rolled back"))?;
    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, description, chrono::Utc::now().timestamp()],
    )
    .map_err(failed(version, "recording version"))?;
    tx.commit().map_err(failed(version, "committing"))
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST_VERSION: u32 = 1;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[1].version > window[0].version);
        }
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn state_table_rejects_missing_scope() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO session_state (key, value, updated_at) VALUES ('k', 'v', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
