//! Rasterising fields into PNG charts.
//!
//! Drawing is split into primitives (`frame`, `sample`, `contour`,
//! `extrema`), the layer canvas, the fixed style tables and the per-panel
//! recipes. [`RasterRenderer`] ties them together behind [`MapRenderer`].

pub mod canvas;
pub mod colormap;
pub mod contour;
pub mod extrema;
pub mod frame;
pub mod panels;
pub mod sample;
pub mod styles;

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{Result, SynopticError};
use crate::fields::FieldSet;
use crate::gallery::{PanelSpec, RenderRequest};

pub use canvas::{encode_png, Canvas, LineStyle, QuiverStyle};
pub use colormap::{get_colormap, Colormap, Extend, LevelTable};
pub use frame::{MapFrame, Projection, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use panels::{draw_panel, PanelKind};

/// Turns one panel's fields into PNG bytes
pub trait MapRenderer: Send + Sync {
    fn render(&self, panel: &PanelSpec, fields: &FieldSet, request: &RenderRequest) -> Result<Vec<u8>>;

    /// The lock every render pipeline must hold
    fn render_lock(&self) -> &RenderLock;
}

/// Allows one render pipeline at a time
#[derive(Debug, Clone, Default)]
pub struct RenderLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one render; dropping it releases the lock
#[derive(Debug)]
pub struct RenderScope {
    _guard: OwnedMutexGuard<()>,
}

impl RenderLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock
    pub async fn acquire(&self) -> RenderScope {
        RenderScope {
            _guard: self.inner.clone().lock_owned().await,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// The in-process raster backend
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    width: u32,
    height: u32,
    projection: Projection,
    lock: RenderLock,
}

impl RasterRenderer {
    pub fn new(width: u32, height: u32, projection: Projection) -> Self {
        Self {
            width,
            height,
            projection,
            lock: RenderLock::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, Projection::Miller)
    }
}

impl MapRenderer for RasterRenderer {
    fn render(&self, panel: &PanelSpec, fields: &FieldSet, request: &RenderRequest) -> Result<Vec<u8>> {
        let frame = MapFrame::new(self.width, self.height, request.bbox, self.projection);
        let mut canvas = Canvas::new(frame);

        let result = draw_panel(&panel.kind, &mut canvas, fields).and_then(|_| canvas.encode_png());
        match result {
            Ok(png) => {
                debug!(panel = %panel.label, bytes = png.len(), "Panel rendered");
                Ok(png)
            }
            Err(e @ SynopticError::Render { .. }) => Err(e),
            Err(e) => Err(SynopticError::Render {
                panel: panel.label.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn render_lock(&self) -> &RenderLock {
        &self.lock
    }
}
