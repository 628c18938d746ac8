//! Ordered schema migrations for the term store.
//!
//! # Invariants
//! - Versions are strictly increasing, starting at 1.
//! - Each step commits its SQL and its `user_version` bump together.
//! - A failing step leaves the database at the previous version.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// One schema step. `sql` must be idempotent DDL.
#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "terms",
        sql: include_str!("0001_terms.sql"),
    },
    Migration {
        version: 2,
        name: "term_relationships",
        sql: include_str!("0002_term_relationships.sql"),
    },
];

/// Latest schema version this binary can write.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in the database.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Runs every migration newer than the database's recorded version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is ahead of this binary.
/// - `MigrationFailed` naming the first step that could not be applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version);
    for migration in pending {
        apply_one(conn, migration).map_err(|source| {
            error!(
                "event=db_migrate module=db status=error version={} name={} error={source}",
                migration.version, migration.name
            );
            DbError::MigrationFailed {
                version: migration.version,
                source,
            }
        })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    Ok(())
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.pragma_update(None, "user_version", migration.version)?;
    tx.commit()
}
