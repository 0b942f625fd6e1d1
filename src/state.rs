//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::dashboard::{RenderStats, ReanalysisDashboard};
use crate::efi::EfiDashboard;
use crate::error::Result;
use crate::loader::{DirectorySource, FieldCache, FieldLoader, FieldSource, ThreddsSource};
use crate::region::{china_regions, global_regions};
use crate::render::{MapRenderer, RasterRenderer};

/// Both dashboards over one renderer, so one lock guards every render
pub struct AppState {
    pub config: Config,
    pub reanalysis: ReanalysisDashboard,
    pub efi: EfiDashboard,
    pub stats: Arc<RenderStats>,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: Config, reanalysis: ReanalysisDashboard, efi: EfiDashboard, stats: Arc<RenderStats>) -> Self {
        Self {
            config,
            reanalysis,
            efi,
            stats,
            started: Instant::now(),
        }
    }

    /// Wire the sources, renderer and dashboards described by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let renderer: Arc<dyn MapRenderer> = Arc::new(RasterRenderer::new(
            config.render.width,
            config.render.height,
            config.projection()?,
        ));
        let stats = Arc::new(RenderStats::default());

        let source: Arc<dyn FieldSource> = match &config.loader.archive_dir {
            Some(root) => {
                info!(root = %root.display(), "Reading reanalysis fields from a local archive");
                Arc::new(DirectorySource::new(root.clone()))
            }
            None => {
                let cache = FieldCache::new(config.loader.cache_dir.clone(), config.cache_retention());
                info!(
                    mirrors = %config.loader.mirrors.join(", "),
                    cache_dir = %cache.dir().display(),
                    "Fetching reanalysis fields from THREDDS"
                );
                Arc::new(ThreddsSource::new(config.thredds(), cache)?)
            }
        };
        let loader = FieldLoader::new(source, config.fetch_timeout());

        let reanalysis = ReanalysisDashboard::new(loader, Arc::clone(&renderer), china_regions(), Arc::clone(&stats));
        let efi = EfiDashboard::new(
            config.efi.data_dir.clone(),
            config.efi.temp_dir.clone(),
            renderer,
            global_regions(),
            Arc::clone(&stats),
        )
        .with_retention(config.efi_retention());

        Ok(Self::new(config, reanalysis, efi, stats))
    }

    /// Names of the configured data sources
    pub fn sources(&self) -> Vec<String> {
        vec![
            self.reanalysis.source_name().to_string(),
            format!("efi:{}", self.efi.data_dir().display()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_with_local_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.loader.archive_dir = Some(dir.path().to_path_buf());
        config.efi.data_dir = dir.path().join("efi");

        let state = AppState::from_config(config).unwrap();
        let sources = state.sources();
        assert_eq!(sources.len(), 2);
        assert!(sources[1].starts_with("efi:"));
        assert_eq!(state.reanalysis.panels().len(), 18);
    }

    #[test]
    fn test_from_config_with_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.loader.cache_dir = dir.path().to_path_buf();
        assert!(AppState::from_config(config).is_ok());
    }

    #[test]
    fn test_from_config_rejects_empty_mirrors() {
        let mut config = Config::default();
        config.loader.mirrors.clear();
        assert!(AppState::from_config(config).is_err());
    }
}
