//! Database schema migrations for the SQLite ledger.
//!
//! Versioned: each migration moves the schema from version N to N+1 and is
//! recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{LedgerError, Result};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "ledger schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(LedgerError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: resources and allowlist.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL DEFAULT 1,
            owner TEXT NOT NULL,              -- normalized 0x-hex actor id
            price INTEGER NOT NULL,           -- 6-decimal base units
            visibility INTEGER NOT NULL,      -- 0=public, 1=private
            balance INTEGER NOT NULL DEFAULT 0,
            downloads INTEGER NOT NULL DEFAULT 0,
            name TEXT NOT NULL,
            description TEXT NOT NULL,

            source_path TEXT NOT NULL,
            source_config TEXT NOT NULL,
            source_split TEXT NOT NULL,
            source_revision TEXT NOT NULL,

            model_name TEXT NOT NULL,
            task_small_id INTEGER NOT NULL,
            node_small_id INTEGER NOT NULL,
            price_per_million_cu INTEGER NOT NULL,
            max_cu INTEGER NOT NULL,

            encrypted_reference BLOB,         -- NULL until locked
            data_hash BLOB,                   -- 32 bytes once locked
            num_rows INTEGER NOT NULL DEFAULT 0,
            num_tokens INTEGER NOT NULL DEFAULT 0,

            created_at INTEGER NOT NULL,
            locked_at INTEGER
        );

        CREATE TABLE allowlist (
            resource_id INTEGER NOT NULL REFERENCES resources(id),
            actor TEXT NOT NULL,
            granted_at INTEGER NOT NULL,
            PRIMARY KEY (resource_id, actor)
        );

        CREATE INDEX idx_resources_owner ON resources(owner);
        "#,
    )?;

    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
