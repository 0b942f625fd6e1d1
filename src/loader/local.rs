//! Field source backed by a local copy of the yearly analysis files.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{decode, FieldSource};
use crate::error::{Result, SynopticError};
use crate::fields::{GridField, Level};
use crate::region::BoundingBox;

/// Reads `{root}/{year}/{code}.{year}.0p5.anl.nc`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive file holding `code` for the year of `time`
    pub fn path_for(&self, code: &str, time: NaiveDateTime) -> PathBuf {
        let year = time.year();
        self.root
            .join(year.to_string())
            .join(format!("{}.{}.0p5.anl.nc", code, year))
    }
}

#[async_trait]
impl FieldSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(
        &self,
        time: NaiveDateTime,
        bbox: &BoundingBox,
        code: &str,
        levels: &[Level],
    ) -> Result<Vec<GridField>> {
        let path = self.path_for(code, time);
        if !path.exists() {
            return Err(SynopticError::unavailable(
                code,
                "any",
                format!("archive file {} not found", path.display()),
            ));
        }

        debug!(path = %path.display(), code = code, "Reading archive file");

        let code = code.to_string();
        let levels = levels.to_vec();
        let bbox = *bbox;
        tokio::task::spawn_blocking(move || decode::read_fields(&path, &code, time, &levels, &bbox))
            .await
            .map_err(|e| SynopticError::Server {
                message: format!("decode task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_path_layout() {
        let source = DirectorySource::new("/data/cfsr");
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(
            source.path_for("pmsl", time),
            PathBuf::from("/data/cfsr/2016/pmsl.2016.0p5.anl.nc")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_data_unavailable() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let time = NaiveDate::from_ymd_opt(2016, 7, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let bbox = BoundingBox::new(70.0, 140.0, 10.0, 65.0).unwrap();

        let result = source.fetch(time, &bbox, "t", &[Level::Isobaric(850)]).await;
        assert!(matches!(
            result,
            Err(SynopticError::DataUnavailable { ref variable, .. }) if variable == "t"
        ));
    }
}
