//! HTTP request handlers for the synoptic server.
//!
//! Every failure becomes a JSON `{error, request_id}` body; see
//! [`response::status_for`] for the status codes.

pub mod efi;
pub mod heartbeat;
pub mod index;
pub mod reanalysis;
pub mod regions;
pub mod response;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::logging::create_http_trace_layer;
use crate::state::AppState;

pub use heartbeat::heartbeat_handler;
pub use index::index_handler;
pub use regions::regions_handler;
pub use response::{ApiError, GalleryFormat};

/// The full route table with CORS and request tracing
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/heartbeat", get(heartbeat_handler))
        .route("/regions", get(regions_handler))
        .route("/reanalysis/composite", get(reanalysis::composite_handler))
        .route("/reanalysis/panel", get(reanalysis::panel_handler))
        .route("/reanalysis/gallery", get(reanalysis::gallery_handler))
        .route("/efi/variables", get(efi::variables_handler))
        .route("/efi/init_times", get(efi::init_times_handler))
        .route("/efi/gallery", get(efi::gallery_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
