// src/session.rs
//! Session Orchestrator: the explicit, passed-around value that replaces
//! the reference implementation's module-level globals (destination root,
//! reference set, counters, shared read buffer, catalog handles). See the
//! design note on process-wide mutable state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::block_store::BlockStore;
use crate::catalog::{DestinationCatalog, ReferenceCatalog};
use crate::constants::{BLOCK_SIZE, DATABASE_FILENAME, INPROGRESS_DIRNAME};
use crate::error::{Error, Result};
use crate::exclude::ExcludeSet;
use crate::progress::ProgressSink;

/// Running totals, mirroring the reference implementation's module-level
/// counters as fields on the session instead.
#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub catalog_entries: u64,
    pub excluded_paths: u64,
    pub changed_files: u64,
    pub unchanged_files: u64,
    pub directories: u64,
    pub symbolic_links: u64,
    pub processed_blocks: u64,
    pub duplicate_blocks: u64,
    pub linked_blocks: u64,
    pub created_blocks: u64,
    pub reference_blocks_missing: u64,
}

/// Caller-supplied configuration for one backup run.
pub struct SessionConfig {
    pub destination: PathBuf,
    pub sources: Vec<PathBuf>,
    pub exclude: ExcludeSet,
    pub dry_run: bool,
    pub progress: Box<dyn ProgressSink>,
}

/// Everything a single backup run needs, threaded explicitly instead of
/// living in process globals.
pub struct Session {
    pub(crate) destination_root: PathBuf,
    pub(crate) destination_set: PathBuf,
    pub(crate) reference_set: Option<PathBuf>,
    pub(crate) catalog: DestinationCatalog,
    pub(crate) reference_catalog: Option<ReferenceCatalog>,
    pub(crate) block_store: BlockStore,
    pub(crate) exclude: ExcludeSet,
    pub(crate) dry_run: bool,
    pub(crate) progress: Box<dyn ProgressSink>,
    pub(crate) read_buffer: Vec<u8>,
    pub(crate) counters: Counters,
    pub(crate) interrupted: Arc<AtomicBool>,
}

/// What to do once a run has either completed or been interrupted.
pub enum RunOutcome {
    Completed(Summary),
    Interrupted,
}

/// The final report handed back to the CLI layer for printing.
pub struct Summary {
    pub destination_set: PathBuf,
    pub reference_set: Option<PathBuf>,
    pub dry_run: bool,
    pub counters: Counters,
}

impl Session {
    fn new(config: SessionConfig) -> Result<Self> {
        let destination_root = &config.destination;
        if !destination_root.is_dir() {
            return Err(Error::DestinationMissing(destination_root.clone()));
        }

        let reference_set = select_reference_set(destination_root)?;
        let destination_set = destination_root.join(INPROGRESS_DIRNAME);

        let catalog = if config.dry_run {
            DestinationCatalog::create_in_memory()?
        } else {
            std::fs::create_dir_all(&destination_set)?;
            DestinationCatalog::create(&destination_set.join(DATABASE_FILENAME))?
        };

        let reference_catalog = match &reference_set {
            Some(set) => {
                info!(reference = %set.display(), "using reference set");
                Some(ReferenceCatalog::open(&set.join(DATABASE_FILENAME))?)
            }
            None => {
                info!("no reference set found; every file will be rehashed");
                None
            }
        };

        let block_store = BlockStore::new(
            destination_root.clone(),
            destination_set.clone(),
            config.dry_run,
        );

        Ok(Self {
            destination_root: destination_root.clone(),
            destination_set,
            reference_set,
            catalog,
            reference_catalog,
            block_store,
            exclude: config.exclude,
            dry_run: config.dry_run,
            progress: config.progress,
            read_buffer: vec![0u8; BLOCK_SIZE],
            counters: Counters::default(),
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Back up one source root: resolve it, upsert its `source` row, find
    /// its counterpart in the reference catalog (if any), and walk it.
    pub(crate) fn backup_root(&mut self, source_root: &Path) -> Result<()> {
        let canonical = source_root
            .canonicalize()
            .map_err(|_| Error::InvalidSourceRoot(source_root.to_path_buf()))?;
        let canonical_str = canonical.to_string_lossy().into_owned();

        let source_id = self.catalog.upsert_source(&canonical_str)?;
        let ref_source_id = match &self.reference_catalog {
            Some(reference) => reference.find_source(&canonical_str)?,
            None => None,
        };

        info!(source = %canonical.display(), "backing up source root");
        self.walk_dir(source_id, ref_source_id, "/", &canonical)
    }

    pub(crate) fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.load(Ordering::SeqCst) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    fn finish(mut self) -> Result<Summary> {
        self.catalog.commit_final()?;
        let destination_set = if self.dry_run {
            self.destination_set.clone()
        } else {
            rename_to_date_string(&self.destination_root, &self.destination_set)?
        };
        Ok(Summary {
            destination_set,
            reference_set: self.reference_set,
            dry_run: self.dry_run,
            counters: self.counters,
        })
    }
}

/// §4.5 step 3: pick the destination root's most recent historical set,
/// sorted by `(prefix, serial)` from names matching `[0-9]*`.
fn select_reference_set(destination_root: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<(String, u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(destination_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        let (prefix, serial) = match name.split_once('-') {
            Some((p, s)) => (p.to_string(), s.parse::<u64>().unwrap_or(0)),
            None => (name.clone(), 0),
        };
        candidates.push((prefix, serial, entry.path()));
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    Ok(candidates.into_iter().next_back().map(|(_, _, path)| path))
}

/// §6: rename `inprogress` to `YYYYMMDD`, or `YYYYMMDD-N` if that name is
/// already taken.
fn rename_to_date_string(destination_root: &Path, destination_set: &Path) -> Result<PathBuf> {
    let today = chrono::Local::now().date_naive().format("%Y%m%d").to_string();
    let mut target = destination_root.join(&today);
    let mut serial = 0u32;
    while target.exists() {
        serial += 1;
        target = destination_root.join(format!("{today}-{serial}"));
    }
    std::fs::rename(destination_set, &target)?;
    Ok(target)
}

/// Run one backup session to completion, or to the point of interruption.
pub fn run(config: SessionConfig, interrupted: Arc<AtomicBool>) -> Result<RunOutcome> {
    let sources = config.sources.clone();
    let mut session = Session::new(config)?;
    session.interrupted = interrupted;

    for root in &sources {
        match session.backup_root(root) {
            Ok(()) => {}
            Err(Error::Interrupted) => {
                warn!("interrupted; committing catalog and leaving inprogress set in place");
                session.catalog.commit_final()?;
                return Ok(RunOutcome::Interrupted);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(RunOutcome::Completed(session.finish()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_reference_set_picks_lexicographically_greatest() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20240101", "20240102", "20240102-1", "other"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        let chosen = select_reference_set(dir.path()).unwrap().unwrap();
        assert_eq!(chosen.file_name().unwrap(), "20240102-1");
    }

    #[test]
    fn select_reference_set_none_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(select_reference_set(dir.path()).unwrap().is_none());
    }
}
