// src/block_store.rs
//! Block Store: the content-addressed block tree under one destination
//! root, `<set>/<hh>/<rest>` sharded by the first two hex chars of the
//! block's SHA-1.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, IoSlice, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::shard;

/// Outcome of writing a block produced while rehashing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Duplicate,
    LinkedFromPeer,
}

/// Outcome of reusing a block referenced by the prior set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    Exists,
    Missing,
}

pub struct BlockStore {
    destination_root: PathBuf,
    destination_set: PathBuf,
    dry_run: bool,
}

fn shard_path(set_dir: &Path, hash: &str) -> PathBuf {
    let (hh, rest) = shard(hash);
    set_dir.join(hh).join(rest)
}

impl BlockStore {
    pub fn new(destination_root: PathBuf, destination_set: PathBuf, dry_run: bool) -> Self {
        Self {
            destination_root,
            destination_set,
            dry_run,
        }
    }

    /// §4.1 `ensure-block`: write, dedup, or peer-link a block produced
    /// while rehashing a file.
    pub fn ensure_block(&self, hash: &str, bytes: &[u8]) -> Result<EnsureOutcome> {
        let target = shard_path(&self.destination_set, hash);

        if !self.dry_run {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        if let Ok(meta) = fs::metadata(&target) {
            if meta.is_file() && meta.len() as usize == bytes.len() {
                return Ok(EnsureOutcome::Duplicate);
            }
        }

        if let Some(peer) = self.find_peer(hash, bytes.len())? {
            if !self.dry_run {
                fs::hard_link(&peer, &target)?;
            }
            return Ok(EnsureOutcome::LinkedFromPeer);
        }

        if self.dry_run {
            return Ok(EnsureOutcome::Created);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)?;
        let written = file.write_vectored(&[IoSlice::new(bytes)])?;
        if written != bytes.len() {
            return Err(Error::ShortBlockWrite {
                hash: hash.to_string(),
                written,
                expected: bytes.len(),
            });
        }
        Ok(EnsureOutcome::Created)
    }

    /// Search every sibling set under the destination root for an existing
    /// block file with this hash and length.
    fn find_peer(&self, hash: &str, len: usize) -> Result<Option<PathBuf>> {
        let entries = match fs::read_dir(&self.destination_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let candidate = shard_path(&entry.path(), hash);
            if let Ok(meta) = fs::metadata(&candidate) {
                if meta.is_file() && meta.len() as usize == len {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    /// §4.1 `link-reference-block`: hard-link a block from the reference
    /// set's tree when reusing a whole unchanged file.
    pub fn link_reference_block(&self, reference_set: &Path, hash: &str) -> Result<LinkOutcome> {
        let target = shard_path(&self.destination_set, hash);

        if !self.dry_run {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        if target.exists() {
            return Ok(LinkOutcome::Exists);
        }

        let source = shard_path(reference_set, hash);
        if !source.exists() {
            return Ok(LinkOutcome::Missing);
        }

        if self.dry_run {
            return Ok(LinkOutcome::Linked);
        }

        match fs::hard_link(&source, &target) {
            Ok(()) => Ok(LinkOutcome::Linked),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(LinkOutcome::Exists),
            Err(e) => Err(e.into()),
        }
    }
}
