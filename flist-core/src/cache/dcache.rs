//! `src/cache/dcache.rs`
//! ============================================================================
//! # Directory Size / Item-Count Cache
//!
//! Sorting by size or by number of items needs per-directory figures that
//! are expensive to recompute on every comparison. Values are keyed by path
//! and stamped with the directory's inode and mtime; a lookup whose stamp no
//! longer matches the file system drops the stale value.

use std::{
    fs::{self, Metadata},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use bytesize::ByteSize;
use moka::sync::Cache;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    config::DcacheConfig,
    error::{FlistError, FlistResult},
    fs::scanner::CancelFlag,
};

/// Lookup counters, shared by every clone of a [`DirCache`].
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Cached values dropped because the directory changed.
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    inode: u64,
    mtime: SystemTime,
}

impl Stamp {
    fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let inode: u64 = {
            use std::os::unix::fs::MetadataExt;
            meta.ino()
        };
        #[cfg(not(unix))]
        let inode: u64 = 0;

        Self {
            inode,
            mtime: meta.modified().unwrap_or(UNIX_EPOCH),
        }
    }

    /// Cached data stays valid unless the directory was replaced or modified
    /// after the value was produced.
    fn still_valid(self, current: Self) -> bool {
        self.inode == current.inode && current.mtime <= self.mtime
    }
}

#[derive(Debug, Clone)]
struct DirInfo {
    stamp: Stamp,
    size: Option<u64>,
    nitems: Option<u64>,
}

/// Per-directory size and item counts keyed by (path, inode, mtime).
#[derive(Clone)]
pub struct DirCache {
    inner: Cache<PathBuf, DirInfo>,
    stats: Arc<CacheStats>,
}

impl std::fmt::Debug for DirCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirCache")
            .field("entries", &self.inner.entry_count())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl Default for DirCache {
    fn default() -> Self {
        Self::with_config(&DcacheConfig::default())
    }
}

impl DirCache {
    #[must_use]
    pub fn with_config(config: &DcacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            inner,
            stats: Arc::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Cached info for `path` if its stamp still matches the file system.
    fn lookup(&self, path: &Path) -> Option<(Stamp, Option<DirInfo>)> {
        let meta: Metadata = fs::metadata(path).ok()?;
        let current: Stamp = Stamp::of(&meta);

        match self.inner.get(path) {
            Some(info) if info.stamp.still_valid(current) => {
                CacheStats::bump(&self.stats.hits);
                Some((current, Some(info)))
            }
            Some(_) => {
                debug!(path = %path.display(), "Directory changed, dropping cached counts");
                CacheStats::bump(&self.stats.invalidations);
                self.inner.invalidate(path);
                Some((current, None))
            }
            None => {
                CacheStats::bump(&self.stats.misses);
                Some((current, None))
            }
        }
    }

    fn store(&self, path: &Path, stamp: Stamp, size: Option<u64>, nitems: Option<u64>) {
        self.inner.insert(path.to_path_buf(), DirInfo { stamp, size, nitems });
    }

    /// Number of items in a directory, counted lazily and cached.
    #[must_use]
    pub fn nitems(&self, path: &Path) -> u64 {
        let Some((stamp, cached)) = self.lookup(path) else {
            return 0;
        };

        if let Some(count) = cached.as_ref().and_then(|info: &DirInfo| -> Option<u64> { info.nitems }) {
            return count;
        }

        let count: u64 = fs::read_dir(path).map_or(0, |r: fs::ReadDir| -> u64 { r.count() as u64 });
        let size: Option<u64> = cached.and_then(|info: DirInfo| -> Option<u64> { info.size });
        self.store(path, stamp, size, Some(count));
        count
    }

    /// Recursive size if it was computed before and is still valid.
    #[must_use]
    pub fn size(&self, path: &Path) -> Option<u64> {
        self.lookup(path)
            .and_then(|(_, cached): (Stamp, Option<DirInfo>)| -> Option<DirInfo> { cached })
            .and_then(|info: DirInfo| -> Option<u64> { info.size })
    }

    /// Walks `path` summing file sizes and caches the result.
    pub fn compute_size(&self, path: &Path, cancel: &CancelFlag) -> FlistResult<u64> {
        let (stamp, cached) = self
            .lookup(path)
            .ok_or_else(|| FlistError::NotFound(path.to_path_buf()))?;

        if let Some(size) = cached.as_ref().and_then(|info: &DirInfo| -> Option<u64> { info.size }) {
            return Ok(size);
        }

        let mut total: u64 = 0;
        for item in WalkDir::new(path).min_depth(1).follow_links(false) {
            cancel.check()?;
            let Ok(item) = item else {
                continue;
            };
            if item.file_type().is_file() {
                total += item.metadata().map_or(0, |m: Metadata| -> u64 { m.len() });
            }
        }

        info!(
            marker = "DCACHE_SIZE",
            operation_type = "compute_size",
            path = %path.display(),
            "Directory size computed: {}",
            ByteSize::b(total)
        );

        let nitems: Option<u64> = cached.and_then(|info: DirInfo| -> Option<u64> { info.nitems });
        self.store(path, stamp, Some(total), nitems);
        Ok(total)
    }

    pub fn invalidate(&self, path: &Path) {
        self.inner.invalidate(path);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_nitems_cached() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a"), b"").unwrap();
        fs::write(tmp.path().join("b"), b"").unwrap();

        let cache = DirCache::default();
        assert_eq!(cache.nitems(tmp.path()), 2);
        assert_eq!(cache.nitems(tmp.path()), 2);
        assert_eq!(
            cache.stats(),
            CacheStatsSnapshot {
                hits: 1,
                misses: 1,
                invalidations: 0,
            }
        );
    }

    #[test]
    fn test_size_requires_computation() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/f"), vec![0u8; 100]).unwrap();
        fs::write(tmp.path().join("g"), vec![0u8; 20]).unwrap();

        let cache = DirCache::default();
        assert_eq!(cache.size(tmp.path()), None);

        let size = cache.compute_size(tmp.path(), &CancelFlag::new()).unwrap();
        assert_eq!(size, 120);
        assert_eq!(cache.size(tmp.path()), Some(120));
    }

    #[test]
    fn test_stale_stamp_invalidates() {
        let tmp = TempDir::new().unwrap();
        let cache = DirCache::default();
        assert_eq!(cache.nitems(tmp.path()), 0);

        // Pretend the value was produced before the directory's last change.
        let meta = fs::metadata(tmp.path()).unwrap();
        let mut stamp = Stamp::of(&meta);
        stamp.mtime = stamp.mtime - Duration::from_secs(60);
        cache.store(tmp.path(), stamp, Some(1), Some(42));

        assert_eq!(cache.nitems(tmp.path()), 0);
        assert_eq!(cache.stats().invalidations, 1);
    }
}
