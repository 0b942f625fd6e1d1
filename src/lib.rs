//! # synoptic
//!
//! An HTTP server that draws weather charts from the CFSR reanalysis and
//! galleries of the ECMWF extreme forecast index.
//!
//! ## Architecture
//!
//! - **Regions and times** (`region`): bounding boxes, presets and
//!   initialisation-time validation per provider
//! - **Fields** (`fields`, `loader`): georeferenced grids fetched from THREDDS
//!   or a local archive, decoded from NetCDF and converted to display units
//! - **Diagnostics** (`derive`): wind speed, relative humidity and smoothed
//!   vorticity
//! - **Rendering** (`render`, `gallery`): fixed style tables and layer recipes
//!   rasterised to PNG, assembled into ordered galleries
//! - **Dashboards** (`dashboard`, `efi`): the request pipelines, serialised by
//!   one render lock
//! - **API** (`handlers`): the axum routes

pub mod config;
pub mod dashboard;
pub mod derive;
pub mod efi;
pub mod error;
pub mod fields;
pub mod gallery;
pub mod handlers;
pub mod loader;
pub mod logging;
pub mod region;
pub mod render;
pub mod state;

pub use config::Config;
pub use dashboard::{RenderCounts, RenderStats, ReanalysisDashboard};
pub use efi::EfiDashboard;
pub use error::{Result, SynopticError};
pub use fields::{FieldKey, FieldSet, GridField, Level};
pub use gallery::{Gallery, GalleryImage, PanelSpec, RenderRequest};
pub use logging::{
    create_http_trace_layer, error_kind, generate_request_id, init_tracing, log_error, log_operation_end,
    log_operation_start, log_request_error, log_timed_operation,
};
pub use region::{BoundingBox, RegionPresets};
pub use render::{MapRenderer, RasterRenderer, RenderLock};
pub use state::AppState;
