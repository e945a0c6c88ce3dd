// src/progress.rs
//! Progress reporting, sized down from the reference codebase's pluggable
//! `ProgressTracker` trait to the two axes this tool actually reports:
//! per-file classification and per-block position within a file.

use tracing::info;

/// What happened to one catalog entry, for `--show-file-progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    Directory,
    Symlink,
    Unchanged,
    Excluded,
}

impl FileEvent {
    fn marker(self) -> &'static str {
        match self {
            FileEvent::Directory => "D",
            FileEvent::Symlink => "S",
            FileEvent::Unchanged => "U",
            FileEvent::Excluded => "X",
        }
    }
}

/// Sink for progress events. Implementations must be cheap to call on
/// every catalog entry and every block, since there is no sampling.
pub trait ProgressSink {
    fn file_event(&self, relative_path: &str, event: FileEvent);
    fn block_progress(&self, relative_path: &str, created: u64, checked: u64, total: u64);
    fn file_rehashed(&self, relative_path: &str, created: u64, checked: u64, total: u64);
}

/// No-op sink, used when neither `--show-file-progress` nor
/// `--show-block-progress` is set.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn file_event(&self, _relative_path: &str, _event: FileEvent) {}
    fn block_progress(&self, _relative_path: &str, _created: u64, _checked: u64, _total: u64) {}
    fn file_rehashed(&self, _relative_path: &str, _created: u64, _checked: u64, _total: u64) {}
}

/// Logs progress through `tracing`, gated independently by the two
/// `--show-*-progress` flags.
pub struct LoggingProgress {
    show_file: bool,
    show_block: bool,
}

impl LoggingProgress {
    pub fn new(show_file: bool, show_block: bool) -> Self {
        Self {
            show_file,
            show_block,
        }
    }
}

impl ProgressSink for LoggingProgress {
    fn file_event(&self, relative_path: &str, event: FileEvent) {
        if self.show_file {
            info!(marker = event.marker(), path = relative_path, "-/-/{}", event.marker());
        }
    }

    fn block_progress(&self, relative_path: &str, created: u64, checked: u64, total: u64) {
        if self.show_block {
            info!(
                created,
                checked, total, path = relative_path, "block progress"
            );
        }
    }

    fn file_rehashed(&self, relative_path: &str, created: u64, checked: u64, total: u64) {
        if self.show_file || self.show_block {
            info!(created, checked, total, path = relative_path, "rehashed");
        }
    }
}
