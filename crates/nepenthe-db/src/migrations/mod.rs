//! Embedded schema migrations.
//!
//! Entry `i` of [`MIGRATIONS`] is schema version `i + 1`. Applied versions
//! are recorded in `schema_migrations`, so opening an up-to-date database
//! is a no-op.

use nepenthe_common::{Error, Result};
use rusqlite::{params, Connection};

const MIGRATIONS: &[(&str, &str)] = &[("initial", include_str!("001_initial.sql"))];

fn failed(version: i64) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::database(format!("migration {version} failed: {e}"))
}

/// Apply every pending migration, each in its own transaction.
///
/// Returns how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    let current = current_version(conn)?;
    let mut applied = 0;

    for (version, (name, sql)) in (1i64..).zip(MIGRATIONS) {
        if version <= current {
            continue;
        }
        let fail = failed(version);
        let tx = conn.unchecked_transaction().map_err(&fail)?;
        tx.execute_batch(sql).map_err(&fail)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![version, name],
        )
        .map_err(&fail)?;
        tx.commit().map_err(&fail)?;

        tracing::info!(version, name, "Applied schema migration");
        applied += 1;
    }

    Ok(applied)
}

/// Highest applied schema version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<i64> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .and_then(|()| {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
    })
    .map_err(|e| Error::database(format!("reading schema version: {e}")))
}

pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}
