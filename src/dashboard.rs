//! The reanalysis dashboard pipeline.
//!
//! Every entry point holds the renderer's lock for the whole pipeline:
//! load, derive, draw. The lock scope is a guard that moves into the
//! blocking render task, so it lives until drawing stops even when the
//! request future is dropped first.

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{Result, SynopticError};
use crate::fields::FieldSet;
use crate::gallery::{self, composite_panel, composite_title, Gallery, GalleryImage, PanelSpec, RenderRequest};
use crate::loader::FieldLoader;
use crate::region::{parse_init_time, resolve_region, RegionPresets, TimeRange};
use crate::render::{MapRenderer, RenderScope};

/// Render counters shown by the heartbeat
#[derive(Debug, Default)]
pub struct RenderStats {
    inner: Mutex<RenderCounts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderCounts {
    pub completed: u64,
    pub failed: u64,
    pub panels_rendered: u64,
    pub panels_skipped: u64,
}

impl RenderStats {
    pub fn record_success(&self, rendered: usize, skipped: usize) {
        let mut counts = self.inner.lock();
        counts.completed += 1;
        counts.panels_rendered += rendered as u64;
        counts.panels_skipped += skipped as u64;
    }

    pub fn record_failure(&self) {
        self.inner.lock().failed += 1;
    }

    pub fn snapshot(&self) -> RenderCounts {
        *self.inner.lock()
    }
}

/// Composite chart, gallery and single panels from CFSR fields
#[derive(Clone)]
pub struct ReanalysisDashboard {
    loader: FieldLoader,
    renderer: Arc<dyn MapRenderer>,
    presets: RegionPresets,
    range: TimeRange,
    panels: Arc<Vec<PanelSpec>>,
    stats: Arc<RenderStats>,
}

impl ReanalysisDashboard {
    pub fn new(
        loader: FieldLoader,
        renderer: Arc<dyn MapRenderer>,
        presets: RegionPresets,
        stats: Arc<RenderStats>,
    ) -> Self {
        Self {
            loader,
            renderer,
            presets,
            range: TimeRange::cfsr(),
            panels: Arc::new(gallery::reanalysis_panels()),
            stats,
        }
    }

    pub fn presets(&self) -> &RegionPresets {
        &self.presets
    }

    pub fn panels(&self) -> &[PanelSpec] {
        &self.panels
    }

    pub fn source_name(&self) -> &str {
        self.loader.source_name()
    }

    /// Whether a render pipeline currently holds the lock
    pub fn is_rendering(&self) -> bool {
        self.renderer.render_lock().is_busy()
    }

    /// Validate form input into a request
    pub fn request(&self, time: &str, region: &str, now: NaiveDateTime) -> Result<RenderRequest> {
        let time = parse_init_time(time, &self.range, now)?;
        let bbox = resolve_region(&self.presets, region)?;
        Ok(RenderRequest::new(time, bbox).with_source("CFSR"))
    }

    /// The synoptic composite chart
    pub async fn composite(&self, request: &RenderRequest) -> Result<GalleryImage> {
        let scope = self.renderer.render_lock().acquire().await;
        let result = self.composite_locked(scope, request).await;
        self.record(&result, |_| (1, 0));
        result
    }

    async fn composite_locked(&self, scope: RenderScope, request: &RenderRequest) -> Result<GalleryImage> {
        let fields = self.load(request).await?;
        let panel = composite_panel();
        ensure_inputs(&panel, &fields)?;
        let png = self.render_one(scope, panel, fields, request.clone()).await?;
        Ok(GalleryImage {
            title: composite_title(request.time),
            png,
        })
    }

    /// All gallery panels, skipping those that cannot be drawn
    pub async fn gallery(&self, request: &RenderRequest) -> Result<Gallery> {
        // reject a bad filter before waiting for the lock
        gallery::select_panels(&self.panels, request.panels.as_deref())?;
        let scope = self.renderer.render_lock().acquire().await;
        let start = Instant::now();
        let result = self.gallery_locked(scope, request).await;
        self.record(&result, |g| (g.len(), g.missing().len()));
        if let Ok(gallery) = &result {
            info!(
                time = %request.time,
                bbox = %request.bbox,
                rendered = gallery.len(),
                skipped = gallery.missing().len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Reanalysis gallery assembled"
            );
        }
        result
    }

    async fn gallery_locked(&self, scope: RenderScope, request: &RenderRequest) -> Result<Gallery> {
        let fields = self.load(request).await?;

        let renderer = Arc::clone(&self.renderer);
        let panels = Arc::clone(&self.panels);
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            let _scope = scope;
            gallery::assemble(&panels, &fields, renderer.as_ref(), &request)
        })
        .await
        .map_err(join_error)?
    }

    /// One panel by label; `Synoptic_Composite` names the composite chart
    pub async fn panel(&self, request: &RenderRequest, label: &str) -> Result<GalleryImage> {
        if label == composite_panel().label {
            return self.composite(request).await;
        }
        let panel = self
            .panels
            .iter()
            .find(|p| p.label == label)
            .cloned()
            .ok_or_else(|| SynopticError::InvalidParameter {
                param: "name".to_string(),
                message: format!("Unknown panel: {}", label),
            })?;

        let scope = self.renderer.render_lock().acquire().await;
        let result = async {
            let fields = self.load(request).await?;
            ensure_inputs(&panel, &fields)?;
            let title = panel.title(request);
            let png = self.render_one(scope, panel, fields, request.clone()).await?;
            Ok::<_, SynopticError>(GalleryImage { title, png })
        }
        .await;
        self.record(&result, |_| (1, 0));
        result
    }

    /// Load what is available; fail only when nothing arrived
    async fn load(&self, request: &RenderRequest) -> Result<FieldSet> {
        let outcome = self.loader.load_partial(request.time, &request.bbox).await;
        if outcome.fields.is_empty() {
            if let Some((_, err)) = outcome.failures.into_iter().next() {
                return Err(err);
            }
        }
        Ok(outcome.fields)
    }

    async fn render_one(
        &self,
        scope: RenderScope,
        panel: PanelSpec,
        fields: FieldSet,
        request: RenderRequest,
    ) -> Result<Vec<u8>> {
        let renderer = Arc::clone(&self.renderer);
        tokio::task::spawn_blocking(move || {
            let _scope = scope;
            renderer.render(&panel, &fields, &request)
        })
            .await
            .map_err(join_error)?
    }

    fn record<T>(&self, result: &Result<T>, counts: impl Fn(&T) -> (usize, usize)) {
        match result {
            Ok(value) => {
                let (rendered, skipped) = counts(value);
                self.stats.record_success(rendered, skipped);
            }
            Err(e) => {
                warn!(error = %e, "Reanalysis render failed");
                self.stats.record_failure();
            }
        }
    }
}

/// A single-panel request cannot degrade: a missing input fails it
fn ensure_inputs(panel: &PanelSpec, fields: &FieldSet) -> Result<()> {
    match panel.requires().into_iter().find(|a| !fields.contains(a)) {
        Some(alias) => Err(SynopticError::unavailable(
            alias,
            "any",
            format!("required by panel {}", panel.label),
        )),
        None => Ok(()),
    }
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> SynopticError {
    SynopticError::Server {
        message: format!("render task failed: {}", e),
    }
}
