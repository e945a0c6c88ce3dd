// src/walker.rs
//! Tree Walker: depth-first traversal of one source root, dispatching
//! each entry to the symlink handler, a recursive directory visit, or the
//! File Engine, while guarding against recursing into the destination.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use tracing::{debug, warn};

use crate::catalog::FileType;
use crate::error::Result;
use crate::mtime::stat_mtime_ns;
use crate::progress::FileEvent;
use crate::session::Session;

/// Join a relative path (already using `/` separators, rooted at `/`)
/// with a child's file name.
fn join_relative(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// True when `a` and `b` are the same inode on the same device, i.e. the
/// same file regardless of the path used to reach it.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

impl Session {
    /// Visit one directory: insert its catalog row, then dispatch every
    /// child by lstat type, skipping the destination root itself and
    /// anything the exclude set matches.
    pub(crate) fn walk_dir(
        &mut self,
        source_id: i64,
        ref_source_id: Option<i64>,
        relative_path: &str,
        absolute_path: &Path,
    ) -> Result<()> {
        self.check_interrupted()?;

        if relative_path != "/" && same_file(absolute_path, &self.destination_root) {
            debug!(path = %absolute_path.display(), "skipping destination root found inside source tree");
            return Ok(());
        }

        self.record_directory(source_id, relative_path, absolute_path)?;

        let entries = match fs::read_dir(absolute_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %absolute_path.display(), error = %e, "cannot read directory; skipping subtree");
                return Ok(());
            }
        };

        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(entry),
                Err(e) => {
                    warn!(path = %absolute_path.display(), error = %e, "error reading directory entry; skipping remainder");
                    break;
                }
            }
        }
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            self.check_interrupted()?;

            let name = entry.file_name().to_string_lossy().into_owned();
            let child_relative = join_relative(relative_path, &name);
            let child_absolute = entry.path();

            if self.exclude.is_excluded(&child_relative) {
                self.counters.excluded_paths += 1;
                self.progress.file_event(&child_relative, FileEvent::Excluded);
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!(path = %child_absolute.display(), error = %e, "permission denied on child stat; skipping");
                    continue;
                }
            };
            if file_type.is_symlink() {
                self.record_symlink(source_id, &child_relative, &child_absolute)?;
            } else if file_type.is_dir() {
                self.walk_dir(source_id, ref_source_id, &child_relative, &child_absolute)?;
            } else if file_type.is_file() {
                self.process_file(source_id, ref_source_id, &child_relative, &child_absolute)?;
            } else if file_type.is_block_device()
                || file_type.is_char_device()
                || file_type.is_fifo()
                || file_type.is_socket()
            {
                debug!(path = %child_absolute.display(), "skipping special file");
            }
        }

        Ok(())
    }

    fn record_directory(
        &mut self,
        source_id: i64,
        relative_path: &str,
        absolute_path: &Path,
    ) -> Result<()> {
        let meta = fs::symlink_metadata(absolute_path)?;
        self.catalog.upsert_file(
            source_id,
            relative_path,
            FileType::Directory,
            &format!("{:o}", meta.mode() & 0o7777),
            meta.uid(),
            meta.gid(),
            crate::mtime::encode_mtime_ns(stat_mtime_ns(&meta)),
            0,
            None,
        )?;
        self.counters.directories += 1;
        self.counters.catalog_entries += 1;
        self.progress.file_event(relative_path, FileEvent::Directory);
        Ok(())
    }

    fn record_symlink(
        &mut self,
        source_id: i64,
        relative_path: &str,
        absolute_path: &Path,
    ) -> Result<()> {
        let meta = fs::symlink_metadata(absolute_path)?;
        let target = fs::read_link(absolute_path)?;
        self.catalog.upsert_file(
            source_id,
            relative_path,
            FileType::Symlink,
            &format!("{:o}", meta.mode() & 0o7777),
            meta.uid(),
            meta.gid(),
            crate::mtime::encode_mtime_ns(stat_mtime_ns(&meta)),
            0,
            Some(&target.to_string_lossy()),
        )?;
        self.counters.symbolic_links += 1;
        self.counters.catalog_entries += 1;
        self.progress.file_event(relative_path, FileEvent::Symlink);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_relative_handles_root() {
        assert_eq!(join_relative("/", "a"), "/a");
        assert_eq!(join_relative("/a", "b"), "/a/b");
    }

    #[test]
    fn same_file_detects_identity() {
        let dir = tempfile::tempdir().unwrap();
        assert!(same_file(dir.path(), dir.path()));
        let other = tempfile::tempdir().unwrap();
        assert!(!same_file(dir.path(), other.path()));
    }
}
