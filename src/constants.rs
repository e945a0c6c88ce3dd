//! Constants shared across the engine, as defined by the on-disk format.

/// Fixed block size: 128 MiB. Changing this invalidates hash comparisons
/// against blocks written by a previous version of this tool.
pub const BLOCK_SIZE: usize = 1 << 27;

/// Name of the active, not-yet-finalized set directory.
pub const INPROGRESS_DIRNAME: &str = "inprogress";

/// Name of the catalog database file inside a set directory.
pub const DATABASE_FILENAME: &str = "catalog.db";

/// How many successful `upsert_file` calls occur between catalog commits.
pub const COMMIT_INTERVAL_FILES: u32 = 100;
