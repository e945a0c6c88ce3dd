// src/catalog/schema.rs
//! Catalog schema definition and migration tracking.
//!
//! Follows the reference codebase's `schema_version` table convention: a
//! freshly created catalog applies migration 1 and records that it did so,
//! so a future schema change can be added as migration 2 without touching
//! this one.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

pub const SCHEMA_VERSION: i32 = 1;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;
    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Bring a freshly opened catalog database up to [`SCHEMA_VERSION`].
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        debug!(current, "catalog schema already up to date");
        return Ok(());
    }
    for version in (current + 1)..=SCHEMA_VERSION {
        info!(version, "applying catalog migration");
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => unreachable!("unknown catalog schema migration: {version}"),
    }
}

/// Initial schema: `source`, `file`, `block`, per the catalog data model.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE source (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE
        );

        CREATE TABLE file (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source INTEGER NOT NULL,
            path TEXT NOT NULL,
            type TEXT NOT NULL,
            mode TEXT NOT NULL,
            uid INTEGER NOT NULL,
            gid INTEGER NOT NULL,
            mtime_ns INTEGER NOT NULL,
            size INTEGER NOT NULL,
            link TEXT,
            UNIQUE(source, path)
        );

        CREATE TABLE block (
            file INTEGER NOT NULL,
            offset INTEGER NOT NULL,
            size INTEGER NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(file, offset, size)
        );

        CREATE INDEX idx_file_source ON file(source);
        CREATE INDEX idx_block_file ON block(file);
        ",
    )?;
    Ok(())
}
