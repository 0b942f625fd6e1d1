//! Reanalysis endpoints: composite chart, single panel and gallery.
//!
//! All three validate `time` (`YYYYMMDDHH`) and `region` (a preset name or a
//! literal "W, E, S, N" box) before anything is fetched.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::response::{gallery_response, png_response, ApiError, GalleryFormat};
use crate::error::{Result, SynopticError};
use crate::gallery::RenderRequest;
use crate::logging::generate_request_id;
use crate::state::AppState;

/// Default region when the form leaves it empty
pub const DEFAULT_REGION: &str = "china";

/// Query parameters of the reanalysis endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReanalysisQuery {
    /// Initialisation time, `YYYYMMDDHH`
    pub time: Option<String>,
    pub region: Option<String>,
    /// Panel label for `/reanalysis/panel`
    pub name: Option<String>,
    /// Comma separated panel labels for `/reanalysis/gallery`
    pub panels: Option<String>,
    /// `html` (default) or `json`
    pub format: Option<String>,
}

impl ReanalysisQuery {
    fn describe(&self) -> String {
        format!(
            "time={}, region={}",
            self.time.as_deref().unwrap_or("none"),
            self.region.as_deref().unwrap_or(DEFAULT_REGION)
        )
    }
}

fn build_request(state: &AppState, query: &ReanalysisQuery) -> Result<RenderRequest> {
    let time = query.time.as_deref().ok_or_else(|| SynopticError::InvalidParameter {
        param: "time".to_string(),
        message: "time is required (YYYYMMDDHH)".to_string(),
    })?;
    let region = query.region.as_deref().unwrap_or(DEFAULT_REGION);
    let now = chrono::Utc::now().naive_utc();
    let request = state.reanalysis.request(time, region, now)?;

    Ok(match query.panels.as_deref() {
        Some(list) => request.with_panels(split_list(list)),
        None => request,
    })
}

/// Comma separated labels, blanks dropped
pub(crate) fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Handle GET /reanalysis/composite requests
pub async fn composite_handler(State(state): State<Arc<AppState>>, Query(query): Query<ReanalysisQuery>) -> Response {
    let request_id = generate_request_id();
    let start = Instant::now();
    debug!(endpoint = "/reanalysis/composite", request_id = %request_id, params = %query.describe(), "Processing composite request");

    let result = async {
        let request = build_request(&state, &query)?;
        state.reanalysis.composite(&request).await
    }
    .await;

    match result {
        Ok(image) => {
            info!(
                endpoint = "/reanalysis/composite",
                request_id = %request_id,
                bytes = image.png.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Composite chart served"
            );
            png_response(image.png, &image.title)
        }
        Err(e) => ApiError::logged(e, "/reanalysis/composite", &request_id, Some(&query.describe())).into_response(),
    }
}

/// Handle GET /reanalysis/panel requests
pub async fn panel_handler(State(state): State<Arc<AppState>>, Query(query): Query<ReanalysisQuery>) -> Response {
    let request_id = generate_request_id();
    let start = Instant::now();

    let result = async {
        let name = query.name.as_deref().ok_or_else(|| SynopticError::InvalidParameter {
            param: "name".to_string(),
            message: "a panel name is required".to_string(),
        })?;
        let request = build_request(&state, &query)?;
        state.reanalysis.panel(&request, name).await
    }
    .await;

    match result {
        Ok(image) => {
            info!(
                endpoint = "/reanalysis/panel",
                request_id = %request_id,
                panel = query.name.as_deref().unwrap_or_default(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Panel served"
            );
            png_response(image.png, &image.title)
        }
        Err(e) => ApiError::logged(e, "/reanalysis/panel", &request_id, Some(&query.describe())).into_response(),
    }
}

/// Handle GET /reanalysis/gallery requests
pub async fn gallery_handler(State(state): State<Arc<AppState>>, Query(query): Query<ReanalysisQuery>) -> Response {
    let request_id = generate_request_id();
    let start = Instant::now();

    let result = async {
        let format = GalleryFormat::parse(query.format.as_deref())?;
        let request = build_request(&state, &query)?;
        let gallery = state.reanalysis.gallery(&request).await?;
        let heading = format!(
            "{} reanalysis | {}UTC | {}",
            request.source,
            request.time.format("%Y-%m-%d %H"),
            request.bbox
        );
        Ok::<_, SynopticError>((gallery, heading, format))
    }
    .await;

    match result {
        Ok((gallery, heading, format)) => {
            info!(
                endpoint = "/reanalysis/gallery",
                request_id = %request_id,
                rendered = gallery.len(),
                skipped = gallery.missing().len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Gallery served"
            );
            gallery_response(&gallery, &heading, format)
        }
        Err(e) => ApiError::logged(e, "/reanalysis/gallery", &request_id, Some(&query.describe())).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" 500hPa_Height, ,850hPa_Wind,"),
            vec!["500hPa_Height".to_string(), "850hPa_Wind".to_string()]
        );
        assert!(split_list("").is_empty());
    }
}
