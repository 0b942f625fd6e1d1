//! Field source backed by a THREDDS NetCDF-subset service.
//!
//! Every variable code lives in one yearly dataset per mirror. A HEAD request
//! on the dataset description decides which mirror serves the request, then a
//! GET retrieves the subset for one time and box as NetCDF into the cache
//! directory, where the shared decoder picks the levels out of it.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Datelike, NaiveDateTime};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::FieldCache;
use super::{decode, FieldSource};
use crate::error::{Result, SynopticError};
use crate::fields::{GridField, Level};
use crate::region::BoundingBox;

/// Default dataset URL template
pub const DEFAULT_URL_TEMPLATE: &str = "{mirror}/ncss/grid/CFSR/{year}/{code}.{year}.0p5.anl.nc";

/// Remote service settings
#[derive(Debug, Clone)]
pub struct ThreddsConfig {
    /// Base URLs, tried in order
    pub mirrors: Vec<String>,
    /// Dataset path with `{mirror}`, `{year}` and `{code}` placeholders
    pub url_template: String,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
}

/// NetCDF-subset client with mirror fallback and an on-disk cache
pub struct ThreddsSource {
    client: Client,
    config: ThreddsConfig,
    cache: FieldCache,
}

impl ThreddsSource {
    pub fn new(config: ThreddsConfig, cache: FieldCache) -> Result<Self> {
        if config.mirrors.is_empty() {
            return Err(SynopticError::Config {
                message: "at least one dataset mirror is required".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    pub fn cache(&self) -> &FieldCache {
        &self.cache
    }

    /// Dataset URL for a code and year on one mirror
    pub fn dataset_url(&self, mirror: &str, code: &str, year: i32) -> String {
        self.config
            .url_template
            .replace("{mirror}", mirror.trim_end_matches('/'))
            .replace("{year}", &year.to_string())
            .replace("{code}", code)
    }

    /// First mirror whose dataset description answers a HEAD request
    async fn pick_mirror(&self, code: &str, year: i32) -> Option<String> {
        for mirror in &self.config.mirrors {
            let probe = format!("{}/dataset.xml", self.dataset_url(mirror, code, year));
            match self.client.head(&probe).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(mirror = %mirror, code = code, "Mirror probe succeeded");
                    return Some(mirror.clone());
                }
                Ok(response) => {
                    warn!(mirror = %mirror, status = %response.status(), "Mirror probe rejected, trying next");
                }
                Err(e) => {
                    warn!(mirror = %mirror, error = %e, "Mirror probe failed, trying next");
                }
            }
        }
        None
    }

    async fn download(&self, code: &str, time: NaiveDateTime, bbox: &BoundingBox, target: &Path) -> Result<()> {
        let year = time.year();
        let mirror = self.pick_mirror(code, year).await.ok_or_else(|| {
            SynopticError::unavailable(code, "any", "no dataset mirror is reachable")
        })?;

        let url = self.dataset_url(&mirror, code, year);
        let query = [
            ("var", code.to_string()),
            ("north", bbox.north().to_string()),
            ("south", bbox.south().to_string()),
            ("west", bbox.west().to_string()),
            ("east", bbox.east().to_string()),
            ("time", time.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("accept", "netcdf".to_string()),
        ];

        info!(url = %url, code = code, time = %time, "Requesting dataset subset");
        let response = self.client.get(&url).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(SynopticError::unavailable(
                code,
                "any",
                format!("subset request returned {}", response.status()),
            ));
        }
        let body = response.bytes().await?;
        store(target, body).await
    }
}

/// Write a downloaded body next to `target`, then move it into place
async fn store(target: &Path, body: Bytes) -> Result<()> {
    let partial = part_path(target);
    tokio::fs::write(&partial, &body).await?;
    tokio::fs::rename(&partial, target).await?;

    debug!(path = %target.display(), bytes = body.len(), "Subset stored in cache");
    Ok(())
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Decode a cached subset; a file that cannot be decoded is removed so the
/// next request downloads it again
fn decode_cached(
    path: &Path,
    code: &str,
    time: NaiveDateTime,
    levels: &[Level],
    bbox: &BoundingBox,
) -> Result<Vec<GridField>> {
    decode::read_fields(path, code, time, levels, bbox).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Discarding cached subset");
        if let Err(remove) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %remove, "Failed to remove cached subset");
        }
        e
    })
}

#[async_trait]
impl FieldSource for ThreddsSource {
    fn name(&self) -> &str {
        "thredds"
    }

    async fn fetch(
        &self,
        time: NaiveDateTime,
        bbox: &BoundingBox,
        code: &str,
        levels: &[Level],
    ) -> Result<Vec<GridField>> {
        self.cache.ensure_dir()?;
        if let Err(e) = self.cache.prune() {
            warn!(error = %e, "Cache pruning failed");
        }

        let path = self.cache.subset_path(code, time, bbox);
        if path.exists() {
            debug!(path = %path.display(), "Using cached subset");
        } else {
            self.download(code, time, bbox, &path).await?;
        }

        let code = code.to_string();
        let levels = levels.to_vec();
        let bbox = *bbox;
        tokio::task::spawn_blocking(move || decode_cached(&path, &code, time, &levels, &bbox))
            .await
            .map_err(|e| SynopticError::Server {
                message: format!("decode task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::cache::DEFAULT_RETENTION;
    use chrono::NaiveDate;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn source(cache_dir: &Path, mirrors: Vec<&str>) -> ThreddsSource {
        let config = ThreddsConfig {
            mirrors: mirrors.into_iter().map(String::from).collect(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            request_timeout: Duration::from_secs(2),
        };
        ThreddsSource::new(config, FieldCache::new(cache_dir, DEFAULT_RETENTION)).unwrap()
    }

    #[tokio::test]
    async fn test_undecodable_cached_subset_is_discarded() {
        let dir = tempdir().unwrap();
        let src = source(dir.path(), vec!["http://127.0.0.1:9/thredds"]);
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let bbox = BoundingBox::new(70.0, 140.0, 10.0, 65.0).unwrap();
        let cached = src.cache.subset_path("pmsl", time, &bbox);
        std::fs::write(&cached, b"<html>Service Unavailable</html>").unwrap();

        assert!(src.fetch(time, &bbox, "pmsl", &[Level::Surface]).await.is_err());
        assert!(!cached.exists());
    }

    #[tokio::test]
    async fn test_store_replaces_part_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("pmsl.nc");
        store(&target, Bytes::from_static(b"CDF\x01")).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"CDF\x01");
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn test_dataset_url() {
        let dir = tempdir().unwrap();
        let src = source(dir.path(), vec!["https://example.org/thredds/"]);
        assert_eq!(
            src.dataset_url("https://example.org/thredds/", "pmsl", 2016),
            "https://example.org/thredds/ncss/grid/CFSR/2016/pmsl.2016.0p5.anl.nc"
        );
    }

    #[test]
    fn test_requires_a_mirror() {
        let dir = tempdir().unwrap();
        let config = ThreddsConfig {
            mirrors: vec![],
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            request_timeout: Duration::from_secs(1),
        };
        let result = ThreddsSource::new(config, FieldCache::new(dir.path(), DEFAULT_RETENTION));
        assert!(matches!(result, Err(SynopticError::Config { .. })));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/t_2016071912.nc")),
            PathBuf::from("/tmp/t_2016071912.nc.part")
        );
    }

    #[tokio::test]
    async fn test_fetch_prunes_cache_even_when_mirrors_are_down() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("stale.nc");
        let file = File::create(&stale).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(8 * 86_400))
            .unwrap();

        let src = source(dir.path(), vec!["http://127.0.0.1:9", "http://127.0.0.1:9"]);
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let bbox = BoundingBox::new(70.0, 140.0, 10.0, 65.0).unwrap();

        let result = src.fetch(time, &bbox, "t", &[Level::Isobaric(850)]).await;
        assert!(matches!(result, Err(SynopticError::DataUnavailable { .. })));
        assert!(!stale.exists());
    }
}
