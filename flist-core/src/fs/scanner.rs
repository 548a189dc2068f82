//! ``src/fs/scanner.rs``
//!
//! # `Directory Scanner`: Synchronous Filesystem Listing
//!
//! Reads one directory into entries sharing the directory as their origin.
//! Scans run on the calling thread; a `CancelFlag` owned by the caller is
//! checked between entries so an event loop can abort a long listing.

use crate::error::{FlistError, FlistResult};
use crate::fs::entry::{Entry, EntryType, Origin};
use std::fs::{self, DirEntry, Metadata, ReadDir};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cooperative cancellation shared between the UI loop and a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the flag is raised.
    #[inline]
    pub fn check(&self) -> FlistResult<()> {
        if self.is_cancelled() {
            Err(FlistError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Listing options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Add a `..` entry pointing at the parent directory.
    pub parent_entry: bool,
}

/// Scans `dir` and returns its entries in directory order.
///
/// Entries whose metadata cannot be read (removed between `readdir` and
/// `stat`, for instance) are skipped.
pub fn scan_directory(
    dir: &Arc<Path>,
    opts: ScanOptions,
    cancel: &CancelFlag,
) -> FlistResult<Vec<Entry>> {
    let start_time: Instant = Instant::now();
    let read_dir: ReadDir = fs::read_dir(dir).map_err(|e| FlistError::from_io(&**dir, e))?;

    let mut entries: Vec<Entry> = Vec::new();

    if opts.parent_entry {
        let mut parent = Entry::synthetic("..", Origin::Shared(dir.clone()), EntryType::Dir);
        if let Some(meta) = dir.parent().and_then(|p: &Path| -> Option<Metadata> { fs::metadata(p).ok() }) {
            parent.mtime = meta.modified().unwrap_or(parent.mtime);
        }
        entries.push(parent);
    }

    for item in read_dir {
        cancel.check()?;

        let item: DirEntry = match item {
            Ok(item) => item,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        let meta: Metadata = match item.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = ?item.path(), error = %e, "Entry vanished during scan");
                continue;
            }
        };

        let file_name = item.file_name();
        let name: &str = match file_name.to_str() {
            Some(name) => name,
            None => {
                debug!(path = ?item.path(), "Skipping entry with non UTF-8 name");
                continue;
            }
        };

        entries.push(Entry::from_metadata(name, Origin::Shared(dir.clone()), &meta));
    }

    let duration: Duration = start_time.elapsed();
    info!(
        marker = "DIRECTORY_SCAN",
        operation_type = "scan_directory",
        entries = entries.len(),
        duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
        "Directory scan of {} completed in {:?}",
        dir.display(),
        duration
    );

    Ok(entries)
}

/// Whether `dir` is a file-system root (no parent component).
#[inline]
#[must_use]
pub fn is_root_dir(dir: &Path) -> bool {
    dir.parent().is_none()
}

/// Joins a relative `path` below `root`, leaving absolute paths alone.
#[must_use]
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_directory() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path();

        fs::write(path.join("file1.txt"), b"one").unwrap();
        fs::write(path.join("file2.txt"), b"two!").unwrap();
        fs::write(path.join(".hidden"), b"").unwrap();
        fs::create_dir(path.join("subdir")).unwrap();

        temp_dir
    }

    #[test]
    fn test_scan_reads_all_entries() {
        let tmp = create_test_directory();
        let dir: Arc<Path> = Arc::from(tmp.path());

        let entries = scan_directory(&dir, ScanOptions::default(), &CancelFlag::new()).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| !e.origin.is_owned()));

        let sub = entries.iter().find(|e| e.name == "subdir").unwrap();
        assert!(sub.is_dir());
        let two = entries.iter().find(|e| e.name == "file2.txt").unwrap();
        assert_eq!(two.size, 4);
    }

    #[test]
    fn test_scan_with_parent_entry() {
        let tmp = create_test_directory();
        let dir: Arc<Path> = Arc::from(tmp.path());

        let opts = ScanOptions { parent_entry: true };
        let entries = scan_directory(&dir, opts, &CancelFlag::new()).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries[0].is_parent_ref());
    }

    #[test]
    fn test_cancelled_scan() {
        let tmp = create_test_directory();
        let dir: Arc<Path> = Arc::from(tmp.path());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = scan_directory(&dir, ScanOptions::default(), &cancel);
        assert!(matches!(result, Err(FlistError::Cancelled)));
    }

    #[test]
    fn test_missing_directory() {
        let dir: Arc<Path> = Arc::from(Path::new("/definitely/not/here"));
        let result = scan_directory(&dir, ScanOptions::default(), &CancelFlag::new());
        assert!(matches!(result, Err(FlistError::NotFound(_))));
    }
}
