//! Cache store - One file per entry under a flat directory
//!
//! The file's modification time is the entry's last access. Reads refresh it,
//! sweeps delete files whose age has reached the TTL.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, trace, warn};

use crate::cache::error::{CacheError, Result};
use crate::core::paths::{entry_path, is_hidden, validate_key};
use crate::core::util::{age_of, is_stale, to_rfc3339, touch};

/// Prefix of in-flight temporary files written by `set`
const TEMP_PREFIX: &str = ".tmp";

/// Minimum age before a sweep may delete a temporary file
const TEMP_GRACE_SECS: i64 = 60;

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Files examined
    pub scanned: usize,
    /// Files deleted as stale
    pub removed: usize,
    /// Directories left untouched
    pub skipped_dirs: usize,
}

/// A single entry as seen on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub size: u64,
    /// Last access, RFC 3339 in UTC
    pub modified: String,
    pub age_secs: u64,
    pub expired: bool,
}

/// Disk-backed key-value cache with TTL eviction
///
/// Dropping a cache with a positive TTL sweeps stale entries. Use
/// [`FileCache::close`] to run that sweep with error propagation.
#[derive(Debug)]
pub struct FileCache {
    ttl: i64,
    base_path: PathBuf,
    closed: bool,
}

impl FileCache {
    /// Create a cache rooted at `base_path`, creating the directory if needed
    ///
    /// `ttl` is in seconds; zero or negative disables the sweep on disposal.
    pub fn new(ttl: i64, base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let base_path = std::path::absolute(base_path)
            .map_err(|e| CacheError::storage(e, base_path, "resolve"))?;

        fs::create_dir_all(&base_path)
            .map_err(|e| CacheError::storage(e, &base_path, "create directory"))?;
        debug!(base_path = %base_path.display(), ttl, "Cache opened");

        Ok(Self {
            ttl,
            base_path,
            closed: false,
        })
    }

    /// Create a cache in the default `http_cache` directory
    pub fn open_default(ttl: i64) -> Result<Self> {
        Self::new(ttl, crate::core::paths::default_cache_dir())
    }

    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute path of the file backing `key`; existence is not checked
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        entry_path(&self.base_path, key)
    }

    /// Check whether an entry exists
    ///
    /// Does not refresh the entry. Invalid keys and filesystem errors read as
    /// absent.
    pub fn has(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        fs::metadata(self.base_path.join(key))
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Read an entry, returning `None` on a miss
    ///
    /// A hit refreshes the entry's modification time so it survives the next
    /// sweep; failing to refresh does not fail the read.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(key, "Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::storage(e, &path, "open")),
        };

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| CacheError::storage(e, &path, "read"))?;

        if let Err(e) = touch(&file, SystemTime::now()) {
            debug!(key, error = %e, "Failed to refresh cache entry timestamp");
        }
        trace!(key, bytes = content.len(), "Cache hit");

        Ok(Some(content))
    }

    /// Store an entry, replacing any previous content
    ///
    /// Content goes to a temporary file in the cache directory which is then
    /// renamed over the entry, so readers never see a partial write.
    pub fn set(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.path(key)?;

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.base_path)
            .map_err(|e| CacheError::storage(e, &self.base_path, "create temporary file"))?;
        temp.write_all(content)
            .map_err(|e| CacheError::storage(e, temp.path(), "write"))?;
        temp.persist(&path)
            .map_err(|e| CacheError::storage(e.error, &path, "write"))?;

        trace!(key, bytes = content.len(), "Cache entry stored");
        Ok(())
    }

    /// Delete every entry whose age is at least `ttl` seconds
    ///
    /// `ttl` applies to this call only. A missing cache directory, stray
    /// subdirectories and files deleted by a concurrent sweep are tolerated.
    /// Temporary files of in-flight writes are only removed once they are
    /// older than both `ttl` and a fixed grace period.
    pub fn clear(&self, ttl: i64) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = SystemTime::now();

        let Some(dir) = self.read_dir()? else {
            debug!(base_path = %self.base_path.display(), "Cache directory missing, nothing to sweep");
            return Ok(report);
        };

        for entry in dir {
            let entry = entry.map_err(|e| CacheError::storage(e, &self.base_path, "list"))?;
            let path = entry.path();

            let Some(metadata) = metadata_if_present(&path)? else {
                continue;
            };
            if metadata.is_dir() {
                report.skipped_dirs += 1;
                continue;
            }
            report.scanned += 1;

            let threshold = if is_hidden(&path) {
                ttl.max(TEMP_GRACE_SECS)
            } else {
                ttl
            };
            let modified = metadata
                .modified()
                .map_err(|e| CacheError::storage(e, &path, "stat"))?;
            if !is_stale(age_of(modified, now), threshold) {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    report.removed += 1;
                    trace!(path = %path.display(), "Removed stale cache entry");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::storage(e, &path, "remove")),
            }
        }

        debug!(
            ttl,
            scanned = report.scanned,
            removed = report.removed,
            skipped_dirs = report.skipped_dirs,
            "Cache swept"
        );
        Ok(report)
    }

    /// List entries sorted by key, flagging those stale under `ttl`
    ///
    /// With a non-positive `ttl` nothing expires. Temporary files from
    /// in-flight writes are not listed.
    pub fn entries(&self, ttl: i64) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        let now = SystemTime::now();

        let Some(dir) = self.read_dir()? else {
            return Ok(entries);
        };

        for entry in dir {
            let entry = entry.map_err(|e| CacheError::storage(e, &self.base_path, "list"))?;
            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }

            let Some(metadata) = metadata_if_present(&path)? else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }

            let modified = metadata
                .modified()
                .map_err(|e| CacheError::storage(e, &path, "stat"))?;
            let age = age_of(modified, now);

            entries.push(EntryInfo {
                key: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                modified: to_rfc3339(modified),
                age_secs: age.as_secs(),
                expired: ttl > 0 && is_stale(age, ttl),
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Run the disposal sweep now and propagate its outcome
    ///
    /// With a non-positive TTL nothing is deleted. The sweep on drop is
    /// disarmed either way.
    pub fn close(mut self) -> Result<SweepReport> {
        self.closed = true;
        self.sweep_on_dispose()
    }

    fn sweep_on_dispose(&self) -> Result<SweepReport> {
        if self.ttl > 0 {
            self.clear(self.ttl)
        } else {
            Ok(SweepReport::default())
        }
    }

    fn read_dir(&self) -> Result<Option<fs::ReadDir>> {
        match fs::read_dir(&self.base_path) {
            Ok(dir) => Ok(Some(dir)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::storage(e, &self.base_path, "list")),
        }
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.sweep_on_dispose() {
            warn!(error = %e, "Cache sweep on drop failed");
        }
    }
}

/// Metadata of an entry, following symlinks; `None` if it vanished
fn metadata_if_present(path: &Path) -> Result<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::storage(e, path, "stat")),
    }
}

/// Backdate a file's modification time by `secs` seconds
#[cfg(test)]
pub(crate) fn backdate(path: &Path, secs: u64) -> std::io::Result<()> {
    let then = SystemTime::now() - std::time::Duration::from_secs(secs);
    let file = File::options().write(true).open(path)?;
    touch(&file, then)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_nested_directory() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("a/b/http_cache");

        let cache = FileCache::new(0, &base).unwrap();
        assert!(base.is_dir());
        assert!(cache.base_path().is_absolute());
        assert_eq!(cache.ttl(), 0);
    }

    #[test]
    fn test_get_miss_then_hit() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();

        assert_eq!(cache.get("entry").unwrap(), None);
        cache.set("entry", b"\x00\x01binary\xff").unwrap();
        assert_eq!(cache.get("entry").unwrap(), Some(b"\x00\x01binary\xff".to_vec()));
    }

    #[test]
    fn test_set_empty_content() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();

        cache.set("empty", b"").unwrap();
        assert!(cache.has("empty"));
        assert_eq!(cache.get("empty").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_set_leaves_no_temporary_files() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();

        cache.set("a", b"one").unwrap();
        cache.set("a", b"two").unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_get_refreshes_timestamp() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        cache.set("entry", b"data").unwrap();

        let path = cache.path("entry").unwrap();
        backdate(&path, 3600).unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        cache.get("entry").unwrap();
        let after = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(after > before);
        assert!(age_of(after, SystemTime::now()).as_secs() < 60);
    }

    #[test]
    fn test_has_does_not_refresh() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        cache.set("entry", b"data").unwrap();

        let path = cache.path("entry").unwrap();
        backdate(&path, 3600).unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        assert!(cache.has("entry"));
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_invalid_keys_never_touch_filesystem() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("cache");
        let cache = FileCache::new(0, &base).unwrap();
        fs::write(temp.path().join("outside"), b"secret").unwrap();

        assert!(!cache.has("../outside"));
        assert!(cache.get("../outside").unwrap_err().is_invalid_key());
        assert!(cache.set("../outside", b"x").unwrap_err().is_invalid_key());
        assert!(cache.path("sub/key").unwrap_err().is_invalid_key());
        assert_eq!(fs::read(temp.path().join("outside")).unwrap(), b"secret");
    }

    #[test]
    fn test_path_is_absolute_and_unchecked() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();

        let path = cache.path("missing").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("missing"));
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_removes_only_stale_entries() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        cache.set("old", b"1").unwrap();
        cache.set("new", b"2").unwrap();
        backdate(&cache.path("old").unwrap(), 120).unwrap();

        let report = cache.clear(60).unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                removed: 1,
                skipped_dirs: 0
            }
        );
        assert!(!cache.has("old"));
        assert!(cache.has("new"));
    }

    #[test]
    fn test_clear_with_zero_ttl_removes_everything() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        cache.set("a", b"1").unwrap();
        cache.set("b", b"2").unwrap();

        assert_eq!(cache.clear(0).unwrap().removed, 2);
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_clear_skips_directories() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        let stray = temp.path().join("stray");
        fs::create_dir(&stray).unwrap();
        fs::write(stray.join("inner"), b"x").unwrap();

        let report = cache.clear(0).unwrap();
        assert_eq!(report.skipped_dirs, 1);
        assert!(stray.join("inner").exists());
    }

    #[test]
    fn test_clear_keeps_fresh_temporary_files() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        let fresh = temp.path().join(".tmpFresh");
        let stale = temp.path().join(".tmpStale");
        fs::write(&fresh, b"partial").unwrap();
        fs::write(&stale, b"leftover").unwrap();
        backdate(&stale, 120).unwrap();

        let report = cache.clear(0).unwrap();
        assert_eq!(report.removed, 1);
        assert!(fresh.exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_set_survives_concurrent_sweeps() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::Relaxed) {
                    cache.clear(0).unwrap();
                }
            });
            for _ in 0..2000 {
                cache.set("k", &[7u8; 4096]).unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Relaxed);
        });
    }

    #[test]
    fn test_get_on_directory_is_storage_error() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        fs::create_dir(temp.path().join("stray")).unwrap();

        let err = cache.get("stray").unwrap_err();
        assert!(matches!(err, CacheError::Storage { .. }));
        assert!(!cache.has("stray"));
    }

    #[test]
    fn test_clear_propagates_listing_errors() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("http_cache");
        let cache = FileCache::new(0, &base).unwrap();
        fs::remove_dir(&base).unwrap();
        fs::write(&base, b"not a directory").unwrap();

        let err = cache.clear(0).unwrap_err();
        assert!(matches!(err, CacheError::Storage { operation: "list", .. }));
        assert!(base.is_file());
    }

    #[test]
    fn test_entries_never_expire_without_ttl() {
        let temp = tempdir().unwrap();
        for ttl in [0, -5] {
            let cache = FileCache::new(ttl, temp.path()).unwrap();
            cache.set("fresh", b"1").unwrap();
            cache.set("old", b"2").unwrap();
            backdate(&cache.path("old").unwrap(), 86400).unwrap();

            let entries = cache.entries(cache.ttl()).unwrap();
            assert_eq!(entries.len(), 2);
            assert!(entries.iter().all(|e| !e.expired), "ttl {ttl}");
        }
    }

    #[test]
    fn test_clear_missing_directory_is_noop() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("http_cache");
        let cache = FileCache::new(0, &base).unwrap();
        fs::remove_dir_all(&base).unwrap();

        assert_eq!(cache.clear(60).unwrap(), SweepReport::default());
        assert!(cache.entries(60).unwrap().is_empty());
    }

    #[test]
    fn test_entries_sorted_and_flagged() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(0, temp.path()).unwrap();
        cache.set("b", b"22").unwrap();
        cache.set("a", b"1").unwrap();
        backdate(&cache.path("b").unwrap(), 600).unwrap();
        fs::write(temp.path().join(".tmpXYZ"), b"partial").unwrap();

        let entries = cache.entries(300).unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(!entries[0].expired);
        assert!(entries[1].expired);
        assert_eq!(entries[1].size, 2);
        assert!(entries[1].age_secs >= 600);
    }

    #[test]
    fn test_close_sweeps_with_configured_ttl() {
        let temp = tempdir().unwrap();
        let cache = FileCache::new(60, temp.path()).unwrap();
        cache.set("old", b"1").unwrap();
        cache.set("fresh", b"2").unwrap();
        backdate(&cache.path("old").unwrap(), 120).unwrap();

        let report = cache.close().unwrap();
        assert_eq!(report.removed, 1);
        assert!(!temp.path().join("old").exists());
        assert!(temp.path().join("fresh").exists());
    }

    #[test]
    fn test_close_with_non_positive_ttl_keeps_everything() {
        let temp = tempdir().unwrap();
        for ttl in [0, -1] {
            let cache = FileCache::new(ttl, temp.path()).unwrap();
            cache.set("old", b"1").unwrap();
            backdate(&cache.path("old").unwrap(), 10 * 365 * 86400).unwrap();

            assert_eq!(cache.close().unwrap(), SweepReport::default());
            assert!(temp.path().join("old").exists());
        }
    }

    #[test]
    fn test_drop_sweeps_stale_entries() {
        let temp = tempdir().unwrap();
        {
            let cache = FileCache::new(60, temp.path()).unwrap();
            cache.set("old", b"1").unwrap();
            backdate(&cache.path("old").unwrap(), 120).unwrap();
        }
        assert!(!temp.path().join("old").exists());
    }
}
