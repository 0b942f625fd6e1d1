//! On-disk cache for downloaded grid files.
//!
//! Files are named after what they contain, so a repeated request for the
//! same variable, time and region reuses the earlier download. Eviction is
//! by age only: anything older than the retention window is deleted at the
//! start of the next fetch.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::region::BoundingBox;

/// Default retention window (7 days)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 86_400);

/// A directory of cached files with age-based pruning
#[derive(Debug, Clone)]
pub struct FieldCache {
    dir: PathBuf,
    retention: Duration,
}

impl FieldCache {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Create the cache directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Path of the cached subset for a variable code, time and region
    pub fn subset_path(&self, code: &str, time: NaiveDateTime, bbox: &BoundingBox) -> PathBuf {
        let [w, e, s, n] = bbox.to_array();
        self.dir.join(format!(
            "{}_{}_{}_{}_{}_{}.nc",
            code,
            time.format("%Y%m%d%H"),
            coord_tag(w),
            coord_tag(e),
            coord_tag(s),
            coord_tag(n)
        ))
    }

    /// Path of a file stored under its own name
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Delete regular files whose modification time is older than the retention window.
    ///
    /// Returns the number of files removed. A missing directory is not an error.
    pub fn prune(&self) -> Result<usize> {
        self.prune_at(SystemTime::now())
    }

    /// Prune relative to a given "now"
    pub fn prune_at(&self, now: SystemTime) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let cutoff = now.checked_sub(self.retention).unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read file age, keeping it");
                    continue;
                }
            };

            if modified < cutoff {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Removed expired cache file");
                        removed += 1;
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
                }
            }
        }

        if removed > 0 {
            info!(
                dir = %self.dir.display(),
                removed = removed,
                retention_days = self.retention.as_secs() / 86_400,
                "Pruned cache directory"
            );
        }

        Ok(removed)
    }
}

/// Encode a coordinate for a file name (e.g. 70.5 -> "70p5", -10 -> "m10")
fn coord_tag(value: f64) -> String {
    let text = format!("{}", value);
    text.replace('-', "m").replace('.', "p")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs::File;
    use tempfile::tempdir;

    fn touch(path: &Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_prune_removes_only_expired_files() {
        let dir = tempdir().unwrap();
        let cache = FieldCache::new(dir.path(), DEFAULT_RETENTION);

        let old = dir.path().join("old.nc");
        let fresh = dir.path().join("fresh.nc");
        touch(&old, Duration::from_secs(8 * 86_400));
        touch(&fresh, Duration::from_secs(3_600));

        assert_eq!(cache.prune().unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_prune_missing_directory() {
        let dir = tempdir().unwrap();
        let cache = FieldCache::new(dir.path().join("absent"), DEFAULT_RETENTION);
        assert_eq!(cache.prune().unwrap(), 0);
    }

    #[test]
    fn test_prune_skips_subdirectories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let cache = FieldCache::new(dir.path(), Duration::from_secs(0));
        let later = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(cache.prune_at(later).unwrap(), 0);
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_subset_path_is_stable() {
        let cache = FieldCache::new("/tmp/cache", DEFAULT_RETENTION);
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let bbox = BoundingBox::new(70.5, 140.0, -10.0, 65.0).unwrap();
        let path = cache.subset_path("t", time, &bbox);
        assert_eq!(
            path,
            PathBuf::from("/tmp/cache/t_2016071912_70p5_140_m10_65.nc")
        );
    }
}
