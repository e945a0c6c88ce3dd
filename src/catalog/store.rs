// src/catalog/store.rs
//! Catalog Store: the transactional table store for one set, plus the
//! read-only view onto a prior set's catalog.

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::model::{BlockRow, FileType, ReferenceFileRow};
use super::schema;
use crate::constants::COMMIT_INTERVAL_FILES;
use crate::error::Result;

/// The destination catalog: read-write, owns the active transaction.
pub struct DestinationCatalog {
    conn: Connection,
    since_commit: u32,
}

impl DestinationCatalog {
    /// Create (or reopen) the catalog database at `db_path`, migrate it,
    /// and begin the first transaction.
    pub fn create(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Dry-run variant: an in-memory database, never touching disk.
    pub fn create_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::migrate(&conn)?;
        conn.execute_batch("BEGIN")?;
        Ok(Self {
            conn,
            since_commit: 0,
        })
    }

    pub fn upsert_source(&self, path: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR REPLACE INTO source (id, path)
             VALUES ((SELECT id FROM source WHERE path = ?1), ?1)",
            params![path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_file(
        &mut self,
        source_id: i64,
        relative_path: &str,
        file_type: FileType,
        mode_octal: &str,
        uid: u32,
        gid: u32,
        mtime_ns: i64,
        size: i64,
        link: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT OR REPLACE INTO file
                (id, source, path, type, mode, uid, gid, mtime_ns, size, link)
             VALUES (
                (SELECT id FROM file WHERE source = ?1 AND path = ?2),
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
             )",
            params![
                source_id,
                relative_path,
                file_type.as_code(),
                mode_octal,
                uid,
                gid,
                mtime_ns,
                size,
                link,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.tick()?;
        Ok(id)
    }

    pub fn delete_blocks_for(&self, file_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM block WHERE file = ?1", params![file_id])?;
        Ok(())
    }

    pub fn insert_block(&self, file_id: i64, offset: i64, size: i64, hash: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO block (file, offset, size, hash) VALUES (?1, ?2, ?3, ?4)",
            params![file_id, offset, size, hash],
        )?;
        Ok(())
    }

    /// Called after every successful `upsert_file`; commits and begins a
    /// fresh transaction every `COMMIT_INTERVAL_FILES` calls.
    fn tick(&mut self) -> Result<()> {
        self.since_commit += 1;
        if self.since_commit % COMMIT_INTERVAL_FILES == 0 {
            self.conn.execute_batch("COMMIT; BEGIN")?;
        }
        Ok(())
    }

    /// Commit whatever transaction is open. Called both on a clean finish
    /// and on interrupt.
    pub fn commit_final(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }
}

/// The reference catalog: a prior set's database, opened strictly
/// read-only.
pub struct ReferenceCatalog {
    conn: Connection,
}

impl ReferenceCatalog {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn find_source(&self, path: &str) -> Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM source WHERE path = ?1", params![path], |r| {
                r.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    pub fn find_file(
        &self,
        source_id: i64,
        relative_path: &str,
    ) -> Result<Option<ReferenceFileRow>> {
        self.conn
            .query_row(
                "SELECT id, mtime_ns, size FROM file
                 WHERE source = ?1 AND path = ?2 AND type = 'F'",
                params![source_id, relative_path],
                |row| {
                    Ok(ReferenceFileRow {
                        id: row.get(0)?,
                        mtime_ns: row.get(1)?,
                        size: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn iter_blocks(&self, file_id: i64) -> Result<Vec<BlockRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT offset, size, hash FROM block WHERE file = ?1 ORDER BY offset ASC")?;
        let rows = stmt.query_map(params![file_id], |row| {
            Ok(BlockRow {
                offset: row.get(0)?,
                size: row.get(1)?,
                hash: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
