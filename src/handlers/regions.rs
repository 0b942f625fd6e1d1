//! Region presets offered by the form.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::response::ApiError;
use crate::error::SynopticError;
use crate::logging::generate_request_id;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RegionsQuery {
    /// `china` (reanalysis presets, default) or `global` (EFI presets)
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegionEntry {
    pub name: String,
    /// `[west, east, south, north]`
    pub bbox: [f64; 4],
}

/// Handle GET /regions requests
pub async fn regions_handler(State(state): State<Arc<AppState>>, Query(query): Query<RegionsQuery>) -> Response {
    let presets = match query.scope.as_deref().unwrap_or("china") {
        "china" => state.reanalysis.presets(),
        "global" => state.efi.presets(),
        other => {
            let error = SynopticError::InvalidParameter {
                param: "scope".to_string(),
                message: format!("Unknown scope: {}. Must be one of: china, global", other),
            };
            return ApiError::logged(error, "/regions", &generate_request_id(), None).into_response();
        }
    };

    let entries: Vec<RegionEntry> = presets
        .iter()
        .map(|(name, bbox)| RegionEntry {
            name: name.to_string(),
            bbox: bbox.to_array(),
        })
        .collect();
    Json(entries).into_response()
}
