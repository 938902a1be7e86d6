//! Schema migration registry, idempotent initialization and destructive reset.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically (`initialize_schema`).
//! - Drop and recreate all client tables on explicit request (`reset_schema`).
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - `initialize_schema` never drops data; only `reset_schema` does.

use crate::db::{DbError, DbResult};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_clients.sql"),
}];

/// Tables owned by the schema, children first so drops respect foreign keys.
const OWNED_TABLES: &[&str] = &["telephones", "clients"];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Ensures the `clients` and `telephones` tables exist.
///
/// Safe to call on every startup: an up-to-date database is left untouched.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn initialize_schema(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    apply_pending(&tx, current_version)?;
    tx.commit()?;

    info!(
        "event=schema_init module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

/// Drops every client table and recreates the schema from scratch.
///
/// All clients and telephones are deleted. Runs in one transaction, so a
/// failure leaves the previous data intact.
pub fn reset_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for table in OWNED_TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    tx.execute_batch("PRAGMA user_version = 0;")?;
    apply_pending(&tx, 0)?;
    tx.commit()?;

    warn!(
        "event=schema_reset module=db status=ok to_version={}",
        latest_version()
    );
    Ok(())
}

fn apply_pending(tx: &Transaction<'_>, current_version: u32) -> DbResult<()> {
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    Ok(())
}

pub(crate) fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
