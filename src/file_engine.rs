// src/file_engine.rs
//! File Engine: decide whether a regular file can be reused whole from
//! the reference set, or must be read and rehashed block by block.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::warn;

use crate::block_store::{EnsureOutcome, LinkOutcome};
use crate::catalog::{FileType, ReferenceFileRow};
use crate::constants::BLOCK_SIZE;
use crate::error::Result;
use crate::hash::sha1_hex;
use crate::mtime::{encode_mtime_ns, stat_mtime_ns};
use crate::progress::FileEvent;
use crate::session::Session;

/// Whole-file reuse test: the prior catalog's `mtime_ns` and `size` must
/// match exactly. Anything else forces a full rehash.
fn should_reuse(reference: &ReferenceFileRow, mtime_ns: i64, size: i64) -> bool {
    reference.mtime_ns == mtime_ns && reference.size == size
}

impl Session {
    pub(crate) fn process_file(
        &mut self,
        source_id: i64,
        ref_source_id: Option<i64>,
        relative_path: &str,
        absolute_path: &Path,
    ) -> Result<()> {
        self.check_interrupted()?;

        let meta = std::fs::symlink_metadata(absolute_path)?;
        let mtime_ns = encode_mtime_ns(stat_mtime_ns(&meta));
        let size = meta.len() as i64;

        let reference_file = match ref_source_id {
            Some(rsid) => self
                .reference_catalog
                .as_ref()
                .expect("reference_catalog set whenever ref_source_id is")
                .find_file(rsid, relative_path)?,
            None => None,
        };

        let file_id = self.catalog.upsert_file(
            source_id,
            relative_path,
            FileType::Regular,
            &format!("{:o}", meta.mode() & 0o7777),
            meta.uid(),
            meta.gid(),
            mtime_ns,
            size,
            None,
        )?;
        self.catalog.delete_blocks_for(file_id)?;

        match reference_file {
            Some(reference) if should_reuse(&reference, mtime_ns, size) => {
                self.reuse_file(file_id, relative_path, &reference)?;
            }
            _ => {
                self.rehash_file(file_id, relative_path, absolute_path, size)?;
            }
        }

        self.counters.catalog_entries += 1;
        Ok(())
    }

    /// Reuse every block the reference catalog recorded for this file,
    /// hard-linking each one from the reference set's tree.
    fn reuse_file(
        &mut self,
        file_id: i64,
        relative_path: &str,
        reference: &ReferenceFileRow,
    ) -> Result<()> {
        let reference_set = self
            .reference_set
            .clone()
            .expect("reference_set present whenever a ReferenceFileRow was found");
        let blocks = self
            .reference_catalog
            .as_ref()
            .expect("checked in process_file")
            .iter_blocks(reference.id)?;

        for block in &blocks {
            match self.block_store.link_reference_block(&reference_set, &block.hash)? {
                LinkOutcome::Linked | LinkOutcome::Exists => {
                    self.counters.linked_blocks += 1;
                }
                LinkOutcome::Missing => {
                    self.counters.reference_blocks_missing += 1;
                    warn!(
                        path = relative_path,
                        hash = %block.hash,
                        "reference block missing; recording row without a backing file"
                    );
                }
            }
            self.catalog
                .insert_block(file_id, block.offset, block.size, &block.hash)?;
            self.counters.processed_blocks += 1;
        }

        self.counters.unchanged_files += 1;
        self.progress.file_event(relative_path, FileEvent::Unchanged);
        Ok(())
    }

    /// Read the file block by block, hashing and storing each one, since
    /// no usable reference entry exists.
    fn rehash_file(
        &mut self,
        file_id: i64,
        relative_path: &str,
        absolute_path: &Path,
        size: i64,
    ) -> Result<()> {
        self.counters.changed_files += 1;

        let mut file = match File::open(absolute_path) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = relative_path,
                    error = %e,
                    "could not open file for hashing; catalog row kept without blocks"
                );
                self.progress.file_rehashed(relative_path, 0, 0, 0);
                return Ok(());
            }
        };
        let total_blocks = if size == 0 {
            0
        } else {
            (size as u64).div_ceil(BLOCK_SIZE as u64)
        };

        let mut offset: i64 = 0;
        let mut created = 0u64;
        let mut checked = 0u64;
        loop {
            self.check_interrupted()?;
            let read = match read_fill(&mut file, &mut self.read_buffer) {
                Ok(read) => read,
                Err(e) => {
                    warn!(
                        path = relative_path,
                        error = %e,
                        "I/O error reading file; remaining bytes lost from this set"
                    );
                    break;
                }
            };
            if read == 0 {
                break;
            }
            let chunk = &self.read_buffer[..read];
            let hash = sha1_hex(chunk);

            match self.block_store.ensure_block(&hash, chunk)? {
                EnsureOutcome::Created => {
                    created += 1;
                    self.counters.created_blocks += 1;
                }
                EnsureOutcome::Duplicate => {
                    checked += 1;
                    self.counters.duplicate_blocks += 1;
                }
                EnsureOutcome::LinkedFromPeer => {
                    checked += 1;
                    self.counters.linked_blocks += 1;
                }
            }
            self.catalog.insert_block(file_id, offset, read as i64, &hash)?;
            self.counters.processed_blocks += 1;
            offset += read as i64;

            self.progress
                .block_progress(relative_path, created, checked, total_blocks);
        }

        self.progress
            .file_rehashed(relative_path, created, checked, total_blocks);
        Ok(())
    }
}

/// Fill `buf` as much as possible from `reader`, stopping early only at
/// EOF (handles short reads from regular files transparently).
fn read_fill(reader: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
